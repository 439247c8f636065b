//! Integration tests for the bridge manager
//!
//! These tests drive [`BridgeManager`] end to end against the in-memory
//! platform and gateway from `test_utils`:
//! - Enable/disable lifecycle and its persistence
//! - Capability changes reaching the endpoint, commands reaching the device
//! - Platform device events (rename, removal)
//! - Startup restore, startup failure and shutdown

use capbridge_core::{
    attr, AttributeValue, CapabilityValue, ClusterId, DeviceId, DeviceType, Driver, EndpointId,
    InboundCommand, Zone,
};
use capbridge_engine::test_utils::{
    color_light, color_light_without_mode, dimmable_light, eventually, init_test_tracing,
    on_off_light, unsupported_device, TestBridge, TEST_MANUAL_PAIRING_CODE, TEST_QR_PAIRING_CODE,
};
use capbridge_engine::{
    BridgeError, EntryState, MemorySettings, AGGREGATOR_ENDPOINT_ID, VERSION,
};
use serde_json::json;
use std::time::Duration;

const SETTINGS_KEY: &str = "enabledDeviceIds";

fn id(s: &str) -> DeviceId {
    DeviceId::from(s)
}

fn ep(s: &str) -> EndpointId {
    EndpointId::from(s)
}

async fn started(devices: Vec<capbridge_core::Device>) -> TestBridge {
    init_test_tracing();
    let bridge = TestBridge::new(devices);
    bridge.manager.start().await.unwrap();
    bridge
}

fn attribute(bridge: &TestBridge, device: &str, cluster: ClusterId, name: &str) -> Option<AttributeValue> {
    bridge
        .gateway
        .attributes(&ep(device))
        .and_then(|a| a.get(cluster, name).cloned())
}

// ============================================================================
// Startup and state
// ============================================================================

#[test]
fn test_version() {
    assert!(!VERSION.is_empty());
    assert_eq!(AGGREGATOR_ENDPOINT_ID, "aggregator");
}

#[tokio::test]
async fn test_state_before_start_is_not_ready() {
    let bridge = TestBridge::new(vec![]);
    let state = bridge.manager.get_state();
    assert!(!state.ready);
    assert!(!state.commissioned);
    assert!(state.qr_pairing_code.is_none());
    assert!(state.manual_pairing_code.is_none());
}

#[tokio::test]
async fn test_state_after_start() {
    let bridge = started(vec![]).await;
    bridge.gateway.set_commissioned(true);

    let state = bridge.manager.get_state();
    assert!(state.ready);
    assert!(state.commissioned);
    assert_eq!(state.qr_pairing_code.as_deref(), Some(TEST_QR_PAIRING_CODE));
    assert_eq!(state.manual_pairing_code.as_deref(), Some(TEST_MANUAL_PAIRING_CODE));
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let bridge = started(vec![]).await;
    let err = bridge.manager.start().await.unwrap_err();
    assert!(matches!(err, BridgeError::AlreadyStarted));
    assert_eq!(bridge.factory.created(), 1);
}

#[tokio::test]
async fn test_start_passes_node_options() {
    let bridge = started(vec![]).await;
    let options = bridge.factory.last_options().unwrap();
    assert_eq!(options.id, "test-hub");
    assert_eq!(options.network_port, 5540);
    assert_eq!(options.product_description.device_type, DeviceType::Aggregator);
    assert_eq!(options.command_buffer, 64);
    assert_eq!(bridge.gateway.command_buffer(), 64);
    assert!(bridge.platform.is_connected());
}

#[tokio::test]
async fn test_gateway_creation_failure() {
    let bridge = TestBridge::new(vec![dimmable_light("d1", true, 0.5)]);
    bridge.factory.set_fail(true);

    let err = bridge.manager.start().await.unwrap_err();
    assert!(matches!(err, BridgeError::GatewayCreation(_)));
    assert!(!bridge.manager.is_started());
    assert!(!bridge.manager.get_state().ready);

    // A later start can succeed
    bridge.factory.set_fail(false);
    bridge.manager.start().await.unwrap();
    assert!(bridge.manager.is_started());
}

#[tokio::test]
async fn test_start_restores_persisted_devices() {
    init_test_tracing();
    let settings = MemorySettings::with_value(SETTINGS_KEY, json!(["d1", "ghost", "s1"]));
    let bridge = TestBridge::with_settings(
        vec![dimmable_light("d1", true, 0.5), unsupported_device("s1")],
        settings,
    );
    bridge.manager.start().await.unwrap();

    assert!(bridge.gateway.has_endpoint(&ep("d1")));
    assert!(!bridge.gateway.has_endpoint(&ep("ghost")));
    assert_eq!(bridge.gateway.endpoint_count(), 1);
    assert_eq!(bridge.manager.entry_count(), 1);

    // Missing and unsupported devices stay enabled
    let enabled = bridge.manager.enabled_devices().await;
    assert_eq!(enabled, vec![id("d1"), id("ghost"), id("s1")]);
}

#[tokio::test]
async fn test_failed_restore_disables_device() {
    init_test_tracing();
    let settings = MemorySettings::with_value(SETTINGS_KEY, json!(["d1", "d2"]));
    let bridge = TestBridge::with_settings(
        vec![dimmable_light("d1", true, 0.5), on_off_light("d2", true)],
        settings,
    );
    bridge.gateway.fail_add_for(&ep("d1"));
    bridge.manager.start().await.unwrap();

    assert!(!bridge.manager.is_enabled(&id("d1")).await);
    assert!(bridge.manager.entry(&id("d1")).is_none());
    assert!(bridge.gateway.has_endpoint(&ep("d2")));
    assert_eq!(bridge.settings.snapshot(SETTINGS_KEY), Some(json!(["d2"])));
    assert_eq!(bridge.manager.stats().synthesis_failures, 1);

    let devices = bridge.manager.get_devices().await.unwrap();
    let d1 = devices.iter().find(|d| d.id == id("d1")).unwrap();
    assert!(!d1.is_selected);
    assert!(!d1.is_bridged);
}

#[tokio::test]
async fn test_enabled_device_is_bridged_when_it_appears() {
    init_test_tracing();
    let settings = MemorySettings::with_value(SETTINGS_KEY, json!(["d2"]));
    let bridge = TestBridge::with_settings(vec![], settings);
    bridge.manager.start().await.unwrap();
    assert_eq!(bridge.manager.entry_count(), 0);

    bridge.platform.create_device(dimmable_light("d2", true, 0.5));
    assert!(eventually(|| bridge.gateway.has_endpoint(&ep("d2"))).await);
    assert!(eventually(|| bridge.manager.entry(&id("d2")).is_some()).await);
    assert!(bridge.manager.is_enabled(&id("d2")).await);

    // enabling again changes nothing
    bridge.manager.enable_device(&id("d2")).await.unwrap();
    assert_eq!(bridge.gateway.endpoint_count(), 1);
    assert_eq!(bridge.platform.listener_count(&id("d2"), "dim"), 1);
}

#[tokio::test]
async fn test_malformed_settings_start_empty() {
    let settings = MemorySettings::with_value(SETTINGS_KEY, json!({"not": "a list"}));
    let bridge = TestBridge::with_settings(vec![dimmable_light("d1", true, 0.5)], settings);
    bridge.manager.start().await.unwrap();

    assert_eq!(bridge.manager.entry_count(), 0);
    assert!(bridge.manager.enabled_devices().await.is_empty());
}

// ============================================================================
// Enable / disable
// ============================================================================

#[tokio::test]
async fn test_enable_before_start_is_noop() {
    let bridge = TestBridge::new(vec![dimmable_light("d1", true, 0.5)]);
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    assert_eq!(bridge.manager.entry_count(), 0);
    assert!(bridge.settings.snapshot(SETTINGS_KEY).is_none());
}

#[tokio::test]
async fn test_enable_dimmable_light() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    let descriptor = bridge.gateway.descriptor(&ep("d1")).unwrap();
    assert_eq!(descriptor.device_type, DeviceType::DimmableLight);
    assert_eq!(
        descriptor.clusters,
        vec![
            ClusterId::BridgedDeviceBasicInformation,
            ClusterId::OnOff,
            ClusterId::LevelControl
        ]
    );
    assert_eq!(
        descriptor.attributes.get(ClusterId::LevelControl, attr::CURRENT_LEVEL),
        Some(&AttributeValue::Int(127))
    );
    assert_eq!(
        descriptor.attributes.get(ClusterId::OnOff, attr::ON_OFF),
        Some(&AttributeValue::Bool(true))
    );
    assert_eq!(
        descriptor
            .attributes
            .get(ClusterId::BridgedDeviceBasicInformation, attr::NODE_LABEL),
        Some(&AttributeValue::Text("Dimmable d1".into()))
    );

    let entry = bridge.manager.entry(&id("d1")).unwrap();
    assert_eq!(entry.state().await, EntryState::Active);
    assert_eq!(bridge.settings.snapshot(SETTINGS_KEY), Some(json!(["d1"])));
}

#[tokio::test]
async fn test_enable_on_off_light_has_no_level() {
    let bridge = started(vec![on_off_light("d2", false)]).await;
    bridge.manager.enable_device(&id("d2")).await.unwrap();

    let descriptor = bridge.gateway.descriptor(&ep("d2")).unwrap();
    assert_eq!(descriptor.device_type, DeviceType::OnOffLight);
    assert!(!descriptor.clusters.contains(&ClusterId::LevelControl));
    assert!(descriptor
        .attributes
        .get(ClusterId::LevelControl, attr::CURRENT_LEVEL)
        .is_none());
}

#[tokio::test]
async fn test_enable_twice_keeps_one_subscription_per_capability() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    let manager = bridge.manager.clone();

    let (id_a, id_b) = (id("d1"), id("d1"));
    let (a, b) = tokio::join!(
        manager.enable_device(&id_a),
        manager.enable_device(&id_b)
    );
    a.unwrap();
    b.unwrap();
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    assert_eq!(bridge.manager.entry_count(), 1);
    assert_eq!(bridge.gateway.endpoint_count(), 1);
    assert_eq!(bridge.platform.listener_count(&id("d1"), "onoff"), 1);
    assert_eq!(bridge.platform.listener_count(&id("d1"), "dim"), 1);
}

#[tokio::test]
async fn test_enable_unknown_device() {
    let bridge = started(vec![]).await;
    let err = bridge.manager.enable_device(&id("nope")).await.unwrap_err();
    assert!(matches!(err, BridgeError::DeviceNotFound(ref d) if d == &id("nope")));
    assert!(bridge.manager.enabled_devices().await.is_empty());
}

#[tokio::test]
async fn test_enable_unsupported_device_stays_enabled() {
    let bridge = started(vec![unsupported_device("s1")]).await;
    bridge.manager.enable_device(&id("s1")).await.unwrap();

    assert!(bridge.manager.is_enabled(&id("s1")).await);
    assert!(bridge.manager.entry(&id("s1")).is_none());
    assert_eq!(bridge.gateway.endpoint_count(), 0);
    assert_eq!(bridge.platform.device_listener_count(&id("s1")), 0);
    assert_eq!(bridge.manager.stats().unsupported_devices, 1);
}

#[tokio::test]
async fn test_endpoint_failure_rolls_back_enable() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.gateway.fail_add_for(&ep("d1"));

    let err = bridge.manager.enable_device(&id("d1")).await.unwrap_err();
    assert!(matches!(err, BridgeError::SynthesisFailure { .. }));

    assert!(!bridge.manager.is_enabled(&id("d1")).await);
    assert_eq!(bridge.manager.entry_count(), 0);
    assert_eq!(bridge.platform.device_listener_count(&id("d1")), 0);
    assert_eq!(bridge.settings.snapshot(SETTINGS_KEY), Some(json!([])));
    assert_eq!(bridge.manager.stats().synthesis_failures, 1);
}

#[tokio::test]
async fn test_disable_releases_everything() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();
    bridge.manager.disable_device(&id("d1")).await.unwrap();

    assert_eq!(bridge.platform.device_listener_count(&id("d1")), 0);
    assert!(!bridge.gateway.has_endpoint(&ep("d1")));
    assert!(bridge.manager.entry(&id("d1")).is_none());
    assert_eq!(bridge.settings.snapshot(SETTINGS_KEY), Some(json!([])));

    // Disabling again is a no-op
    bridge.manager.disable_device(&id("d1")).await.unwrap();
}

#[tokio::test]
async fn test_disable_unknown_device() {
    let bridge = started(vec![]).await;
    let err = bridge.manager.disable_device(&id("nope")).await.unwrap_err();
    assert!(matches!(err, BridgeError::DeviceNotFound(_)));
}

#[tokio::test]
async fn test_reenable_yields_identical_shape() {
    let bridge = started(vec![color_light("c1")]).await;
    bridge.manager.enable_device(&id("c1")).await.unwrap();
    let first = bridge.gateway.descriptor(&ep("c1")).unwrap();

    bridge.manager.disable_device(&id("c1")).await.unwrap();
    bridge.manager.enable_device(&id("c1")).await.unwrap();
    let second = bridge.gateway.descriptor(&ep("c1")).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.device_type, DeviceType::ExtendedColorLight);
}

// ============================================================================
// Source → protocol
// ============================================================================

#[tokio::test]
async fn test_capability_change_reaches_endpoint() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    bridge
        .platform
        .emit_capability(&id("d1"), "dim", CapabilityValue::Number(1.0));
    assert!(
        eventually(|| {
            attribute(&bridge, "d1", ClusterId::LevelControl, attr::CURRENT_LEVEL)
                == Some(AttributeValue::Int(254))
        })
        .await
    );

    bridge
        .platform
        .emit_capability(&id("d1"), "onoff", CapabilityValue::Bool(false));
    assert!(
        eventually(|| {
            attribute(&bridge, "d1", ClusterId::OnOff, attr::ON_OFF)
                == Some(AttributeValue::Bool(false))
        })
        .await
    );
}

#[tokio::test]
async fn test_out_of_range_values_are_clamped() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    bridge
        .platform
        .emit_capability(&id("d1"), "dim", CapabilityValue::Number(1.7));
    assert!(
        eventually(|| {
            attribute(&bridge, "d1", ClusterId::LevelControl, attr::CURRENT_LEVEL)
                == Some(AttributeValue::Int(254))
        })
        .await
    );

    bridge
        .platform
        .emit_capability(&id("d1"), "dim", CapabilityValue::Number(-0.3));
    assert!(
        eventually(|| {
            attribute(&bridge, "d1", ClusterId::LevelControl, attr::CURRENT_LEVEL)
                == Some(AttributeValue::Int(1))
        })
        .await
    );
}

#[tokio::test]
async fn test_null_capability_becomes_null_attribute() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    bridge
        .platform
        .emit_capability(&id("d1"), "dim", CapabilityValue::Null);
    assert!(
        eventually(|| {
            attribute(&bridge, "d1", ClusterId::LevelControl, attr::CURRENT_LEVEL)
                == Some(AttributeValue::Null)
        })
        .await
    );
}

#[tokio::test]
async fn test_changes_after_disable_are_not_forwarded() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();
    bridge.manager.disable_device(&id("d1")).await.unwrap();
    let patches = bridge.gateway.patches_for(&ep("d1")).len();

    bridge
        .platform
        .emit_capability(&id("d1"), "dim", CapabilityValue::Number(0.9));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(bridge.gateway.patches_for(&ep("d1")).len(), patches);
    assert_eq!(bridge.manager.stats().update_errors, 0);
}

#[tokio::test]
async fn test_inactive_color_mode_is_not_forwarded() {
    let bridge = started(vec![color_light("c1")]).await;
    bridge.manager.enable_device(&id("c1")).await.unwrap();

    // The light is in hue/saturation mode
    bridge
        .platform
        .emit_capability(&id("c1"), "light_temperature", CapabilityValue::Number(1.0));
    bridge
        .platform
        .emit_capability(&id("c1"), "dim", CapabilityValue::Number(1.0));
    assert!(
        eventually(|| {
            attribute(&bridge, "c1", ClusterId::LevelControl, attr::CURRENT_LEVEL)
                == Some(AttributeValue::Int(254))
        })
        .await
    );
    assert!(bridge
        .gateway
        .patches_for(&ep("c1"))
        .iter()
        .all(|p| p.get(ClusterId::ColorControl, attr::COLOR_TEMPERATURE_MIREDS).is_none()));
}

// ============================================================================
// Protocol → source
// ============================================================================

#[tokio::test]
async fn test_command_reaches_device() {
    let bridge = started(vec![dimmable_light("d1", false, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    assert!(bridge
        .gateway
        .send_command(&ep("d1"), InboundCommand::OnOff { on: true }));
    assert!(
        eventually(|| {
            bridge
                .platform
                .writes()
                .contains(&(id("d1"), "onoff".to_string(), CapabilityValue::Bool(true)))
        })
        .await
    );

    // The platform echoes the write, which comes back as an attribute
    assert!(
        eventually(|| {
            attribute(&bridge, "d1", ClusterId::OnOff, attr::ON_OFF)
                == Some(AttributeValue::Bool(true))
        })
        .await
    );
}

#[tokio::test]
async fn test_disable_waits_for_running_command() {
    let bridge = started(vec![dimmable_light("d1", false, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();
    bridge.platform.set_write_delay(Duration::from_millis(200));

    assert!(bridge
        .gateway
        .send_command(&ep("d1"), InboundCommand::OnOff { on: true }));
    assert!(eventually(|| bridge.manager.stats().commands_received == 1).await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    bridge.manager.disable_device(&id("d1")).await.unwrap();

    // The write finished before teardown did, and nothing lands afterwards
    let writes = bridge.platform.writes();
    assert_eq!(
        writes,
        vec![(id("d1"), "onoff".to_string(), CapabilityValue::Bool(true))]
    );
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(bridge.platform.writes(), writes);
    assert_eq!(bridge.platform.device_listener_count(&id("d1")), 0);
    assert!(!bridge.gateway.has_endpoint(&ep("d1")));
}

#[tokio::test]
async fn test_color_light_without_mode_follows_commands() {
    let bridge = started(vec![color_light_without_mode("c2")]).await;
    bridge.manager.enable_device(&id("c2")).await.unwrap();
    assert_eq!(
        attribute(&bridge, "c2", ClusterId::ColorControl, attr::COLOR_MODE),
        Some(AttributeValue::Int(0))
    );

    assert!(bridge
        .gateway
        .send_command(&ep("c2"), InboundCommand::MoveToColorTemperature { mireds: 500 }));
    assert!(
        eventually(|| {
            attribute(&bridge, "c2", ClusterId::ColorControl, attr::COLOR_TEMPERATURE_MIREDS)
                == Some(AttributeValue::Int(500))
        })
        .await
    );
    assert_eq!(
        attribute(&bridge, "c2", ClusterId::ColorControl, attr::COLOR_MODE),
        Some(AttributeValue::Int(2))
    );
    assert_eq!(
        attribute(&bridge, "c2", ClusterId::ColorControl, attr::CURRENT_HUE),
        Some(AttributeValue::Null)
    );

    // Back to hue/saturation through a device-side change
    bridge
        .platform
        .emit_capability(&id("c2"), "light_hue", CapabilityValue::Number(0.25));
    assert!(
        eventually(|| {
            attribute(&bridge, "c2", ClusterId::ColorControl, attr::COLOR_MODE)
                == Some(AttributeValue::Int(0))
        })
        .await
    );
    assert_eq!(
        attribute(&bridge, "c2", ClusterId::ColorControl, attr::CURRENT_HUE),
        Some(AttributeValue::Int(64))
    );
    assert_eq!(
        attribute(&bridge, "c2", ClusterId::ColorControl, attr::COLOR_TEMPERATURE_MIREDS),
        Some(AttributeValue::Null)
    );

    // No mode capability is ever written
    assert!(bridge
        .platform
        .writes()
        .iter()
        .all(|(_, cap, _)| cap != "light_mode"));
}

#[tokio::test]
async fn test_level_round_trip() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    bridge.gateway.send_command(
        &ep("d1"),
        InboundCommand::MoveToLevel {
            level: 127,
            with_on_off: false,
        },
    );
    assert!(eventually(|| bridge.platform.writes().len() == 1).await);

    let (_, capability, value) = bridge.platform.writes().remove(0);
    assert_eq!(capability, "dim");
    let dim = value.as_f64().unwrap();
    assert!((dim - 0.5).abs() < 0.01);
    assert!(
        eventually(|| {
            attribute(&bridge, "d1", ClusterId::LevelControl, attr::CURRENT_LEVEL)
                == Some(AttributeValue::Int(127))
        })
        .await
    );
}

#[tokio::test]
async fn test_compound_command_writes_both_capabilities() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    bridge.gateway.send_command(
        &ep("d1"),
        InboundCommand::MoveToLevel {
            level: 1,
            with_on_off: true,
        },
    );
    assert!(eventually(|| bridge.platform.writes().len() == 2).await);
    assert!(bridge
        .platform
        .writes()
        .contains(&(id("d1"), "onoff".to_string(), CapabilityValue::Bool(false))));
    assert!(
        eventually(|| {
            attribute(&bridge, "d1", ClusterId::OnOff, attr::ON_OFF)
                == Some(AttributeValue::Bool(false))
        })
        .await
    );
}

#[tokio::test]
async fn test_unsupported_command_is_counted() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    bridge.gateway.send_command(&ep("d1"), InboundCommand::LockDoor);
    assert!(eventually(|| bridge.manager.stats().command_errors == 1).await);
    assert_eq!(bridge.manager.stats().commands_received, 1);
    assert!(bridge.platform.writes().is_empty());
}

#[tokio::test]
async fn test_failed_write_is_contained() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();
    bridge.platform.fail_writes_for("onoff");

    bridge
        .gateway
        .send_command(&ep("d1"), InboundCommand::OnOff { on: false });
    assert!(eventually(|| bridge.manager.stats().command_errors == 1).await);

    // The entry keeps working
    bridge
        .gateway
        .send_command(&ep("d1"), InboundCommand::MoveToLevel { level: 254, with_on_off: false });
    assert!(eventually(|| bridge.platform.writes().len() == 1).await);
    assert_eq!(
        bridge.manager.entry(&id("d1")).unwrap().state().await,
        EntryState::Active
    );
}

// ============================================================================
// Platform events
// ============================================================================

#[tokio::test]
async fn test_deleted_device_is_unbridged() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5), on_off_light("d2", true)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();
    bridge.manager.enable_device(&id("d2")).await.unwrap();

    bridge.platform.remove_device(&id("d1"));
    assert!(eventually(|| !bridge.gateway.has_endpoint(&ep("d1"))).await);
    assert!(eventually(|| bridge.manager.entry(&id("d1")).is_none()).await);

    assert!(!bridge.manager.is_enabled(&id("d1")).await);
    assert!(bridge.gateway.has_endpoint(&ep("d2")));
    assert_eq!(bridge.settings.snapshot(SETTINGS_KEY), Some(json!(["d2"])));
}

#[tokio::test]
async fn test_created_device_can_be_enabled() {
    let bridge = started(vec![]).await;
    bridge.platform.create_device(dimmable_light("d9", true, 0.2));

    let manager = bridge.manager.clone();
    let mut enabled = false;
    for _ in 0..100 {
        if manager.enable_device(&id("d9")).await.is_ok() {
            enabled = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(enabled);
    assert!(bridge.gateway.has_endpoint(&ep("d9")));
}

#[tokio::test]
async fn test_renamed_device_updates_label() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    let mut device = bridge.platform.device(&id("d1")).unwrap();
    device.name = "Kitchen".into();
    device.available = false;
    bridge.platform.update_device(device);

    assert!(
        eventually(|| {
            attribute(&bridge, "d1", ClusterId::BridgedDeviceBasicInformation, attr::NODE_LABEL)
                == Some(AttributeValue::Text("Kitchen".into()))
        })
        .await
    );
    assert_eq!(
        attribute(&bridge, "d1", ClusterId::BridgedDeviceBasicInformation, attr::REACHABLE),
        Some(AttributeValue::Bool(false))
    );
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_get_devices() {
    init_test_tracing();
    let bridge = TestBridge::new(vec![]);
    let mut lamp = dimmable_light("d1", true, 0.5);
    lamp.zone_id = Some("z1".into());
    lamp.driver_id = Some("homey:app:lamp".into());
    bridge.platform.add_device(lamp);
    bridge.platform.add_device(unsupported_device("s1"));
    bridge.platform.add_zone(Zone {
        id: "z1".into(),
        name: "Kitchen".into(),
    });
    bridge.platform.add_driver(Driver {
        id: "homey:app:lamp".into(),
        name: "Lamp".into(),
        icon_url: Some("/icons/lamp.svg".into()),
    });

    // Before start the catalog comes from the platform directly
    assert_eq!(bridge.manager.get_devices().await.unwrap().len(), 2);

    bridge.manager.start().await.unwrap();
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    let devices = bridge.manager.get_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name, "Dimmable d1");
    assert_eq!(devices[1].name, "Speaker s1");

    let lamp = &devices[0];
    assert!(lamp.is_selected);
    assert!(lamp.is_bridged);
    assert_eq!(lamp.zone_name.as_deref(), Some("Kitchen"));
    assert_eq!(lamp.icon_url.as_deref(), Some("/icons/lamp.svg"));
    assert_eq!(lamp.device_type, Some(DeviceType::DimmableLight));

    let speaker = &devices[1];
    assert!(!speaker.is_selected);
    assert!(speaker.zone_name.is_none());
    assert!(speaker.device_type.is_none());
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_keeps_enabled_set() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    bridge.manager.shutdown().await.unwrap();
    assert!(!bridge.manager.is_started());
    assert_eq!(bridge.manager.entry_count(), 0);
    assert_eq!(bridge.platform.total_listeners(), 0);
    assert_eq!(bridge.settings.snapshot(SETTINGS_KEY), Some(json!(["d1"])));

    // Restart restores the device
    bridge.manager.start().await.unwrap();
    assert!(bridge.gateway.has_endpoint(&ep("d1")));
    assert_eq!(bridge.platform.listener_count(&id("d1"), "dim"), 1);
}

#[tokio::test]
async fn test_stats() {
    let bridge = started(vec![dimmable_light("d1", true, 0.5)]).await;
    bridge.manager.enable_device(&id("d1")).await.unwrap();

    bridge
        .platform
        .emit_capability(&id("d1"), "dim", CapabilityValue::Number(0.1));
    assert!(eventually(|| bridge.manager.stats().updates_forwarded >= 1).await);

    let stats = bridge.manager.stats();
    assert_eq!(stats.active_endpoints, 1);
    assert_eq!(stats.panics_isolated, 0);

    let infos = bridge.manager.entries().await;
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].state, EntryState::Active);
    assert!(infos[0].activated_at.is_some());
}
