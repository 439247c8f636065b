//! Inbound command handling
//!
//! One generic handler serves every endpoint: the capability table tells it
//! which capability each command lands on. Commands that touch several
//! capabilities are written concurrently; if some of those writes fail, the
//! ones that succeeded are restored to their previous values.

use capbridge_core::InboundCommand;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapter::DeviceAdapter;
use crate::binding::CapabilityTable;
use crate::entry::ValueCache;
use crate::error::Result;
use crate::stats::StatsRecorder;
use crate::translator::{self, CapabilityWrite};

/// Applies inbound protocol commands to a source device
#[derive(Debug, Clone)]
pub struct CommandHandler {
    adapter: Arc<DeviceAdapter>,
    table: CapabilityTable,
    values: Arc<ValueCache>,
    stats: Arc<StatsRecorder>,
}

impl CommandHandler {
    /// Create a handler
    pub fn new(
        adapter: Arc<DeviceAdapter>,
        table: CapabilityTable,
        values: Arc<ValueCache>,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            adapter,
            table,
            values,
            stats,
        }
    }

    /// Translate and apply a command
    pub async fn handle(&self, command: InboundCommand) -> Result<()> {
        let writes = translator::reverse(&self.table, command)?;
        debug!(
            device_id = %self.adapter.device_id(),
            command = ?command,
            writes = writes.len(),
            "Handling inbound command"
        );

        match writes.as_slice() {
            [single] => {
                self.adapter
                    .set_capability_value(&single.capability_id, single.value.clone())
                    .await?
            }
            _ => self.write_compound(&writes).await?,
        }
        for write in &writes {
            self.values.note_color_change(&self.table, &write.capability_id);
        }
        Ok(())
    }

    async fn write_compound(&self, writes: &[CapabilityWrite]) -> Result<()> {
        let previous: Vec<_> = writes
            .iter()
            .map(|w| self.values.get(&w.capability_id))
            .collect();

        let results = join_all(
            writes
                .iter()
                .map(|w| self.adapter.set_capability_value(&w.capability_id, w.value.clone())),
        )
        .await;

        if results.iter().all(Result::is_ok) {
            return Ok(());
        }

        let restores: Vec<_> = writes
            .iter()
            .zip(previous)
            .zip(&results)
            .filter(|(_, result)| result.is_ok())
            .filter_map(|((write, prev), _)| {
                prev.filter(|v| !v.is_null())
                    .map(|v| (write.capability_id.as_str(), v))
            })
            .collect();

        let rolled_back = restores.len() as u64;
        for (capability_id, result) in join_all(
            restores
                .into_iter()
                .map(|(cap, value)| async move { (cap, self.adapter.set_capability_value(cap, value).await) }),
        )
        .await
        {
            if let Err(e) = result {
                warn!(
                    device_id = %self.adapter.device_id(),
                    capability = %capability_id,
                    error = %e,
                    "Failed to roll back capability write"
                );
            }
        }
        self.stats.record(|s| s.writes_rolled_back += rolled_back);

        match results.into_iter().find_map(|r| r.err()) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Role;
    use crate::test_utils::MockSourcePlatform;
    use capbridge_core::{Capability, CapabilityValue, Device};
    use std::time::Duration;

    fn setup() -> (Arc<MockSourcePlatform>, CommandHandler, Arc<StatsRecorder>) {
        let platform = Arc::new(MockSourcePlatform::new());
        platform.add_device(
            Device::new("d1", "Lamp", "light")
                .with_capability(Capability::new("onoff", false))
                .with_capability(Capability::new("dim", 0.2)),
        );
        let adapter = Arc::new(DeviceAdapter::new(
            "d1".into(),
            platform.clone(),
            Duration::from_secs(1),
        ));
        let values = Arc::new(ValueCache::new());
        values.set("onoff", CapabilityValue::Bool(false));
        values.set("dim", CapabilityValue::Number(0.2));
        let stats = Arc::new(StatsRecorder::new());
        let table = CapabilityTable::new().bind(Role::OnOff).bind(Role::Dim);
        let handler = CommandHandler::new(adapter, table, values, stats.clone());
        (platform, handler, stats)
    }

    #[tokio::test]
    async fn test_single_write() {
        let (platform, handler, _) = setup();
        handler.handle(InboundCommand::OnOff { on: true }).await.unwrap();
        assert_eq!(
            platform.writes(),
            vec![("d1".into(), "onoff".to_string(), CapabilityValue::Bool(true))]
        );
    }

    #[tokio::test]
    async fn test_compound_write() {
        let (platform, handler, _) = setup();
        handler
            .handle(InboundCommand::MoveToLevel { level: 254, with_on_off: true })
            .await
            .unwrap();

        let writes = platform.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes.contains(&("d1".into(), "dim".to_string(), CapabilityValue::Number(1.0))));
        assert!(writes.contains(&("d1".into(), "onoff".to_string(), CapabilityValue::Bool(true))));
    }

    #[tokio::test]
    async fn test_compound_partial_failure_rolls_back() {
        let (platform, handler, stats) = setup();
        platform.fail_writes_for("onoff");

        let result = handler
            .handle(InboundCommand::MoveToLevel { level: 254, with_on_off: true })
            .await;
        assert!(result.is_err());

        // dim was written, then restored
        let dims: Vec<_> = platform
            .writes()
            .into_iter()
            .filter(|(_, cap, _)| cap == "dim")
            .map(|(_, _, v)| v)
            .collect();
        assert_eq!(
            dims,
            vec![CapabilityValue::Number(1.0), CapabilityValue::Number(0.2)]
        );
        assert_eq!(stats.snapshot().writes_rolled_back, 1);
    }

    #[tokio::test]
    async fn test_unsupported_command() {
        let (platform, handler, _) = setup();
        assert!(handler.handle(InboundCommand::LockDoor).await.is_err());
        assert!(platform.writes().is_empty());
    }
}
