//! The host suite as a plugin sees it.

mod common;

use fxhost::abi::Status;
use fxhost::abi::plugin::HostSlot;
use fxhost::property::keys;

static SLOT: HostSlot = HostSlot::new();

#[test]
fn test_host_description_through_the_suite() {
    let host = common::test_host();
    SLOT.store(host.suite());
    let api = SLOT.get().unwrap();
    let properties = api.host_properties();

    assert_eq!(properties.get_string(keys::HOST_NAME, 0).unwrap(), "org.fxhost");
    assert_eq!(properties.dimension(keys::HOST_PROJECT_SIZE), Ok(2));
    assert_eq!(properties.get_doubles(keys::HOST_PROJECT_SIZE).unwrap(), vec![8.0, 4.0]);
    assert_eq!(
        properties.get_strings(keys::HOST_SUPPORTED_DEPTHS).unwrap(),
        vec!["byte", "short", "float"]
    );

    assert_eq!(properties.get_int(keys::HOST_NAME, 0), Err(Status::ErrValue));
    assert_eq!(properties.get_string(keys::HOST_NAME, 3), Err(Status::ErrBadIndex));
    assert_eq!(properties.get_string("host.colour", 0), Err(Status::ErrUnknown));

    assert_eq!(
        properties.set_string(keys::HOST_NAME, 0, "other"),
        Err(Status::ErrUnsupported)
    );
    assert_eq!(properties.reset(keys::HOST_LABEL), Err(Status::ErrUnsupported));
    assert_eq!(properties.get_string(keys::HOST_NAME, 0).unwrap(), "org.fxhost");
}

#[test]
fn test_variable_key_rejects_write_past_its_end() {
    let host = common::test_host();
    let report = host.register_static("hostilefx", common::hostile_plugin_count, common::hostile_get_plugin);
    assert!(report.failures.is_empty(), "{:?}", report.failures);

    assert_eq!(common::sparse_write_status(), Some(Status::ErrBadIndex));
    let plugin = host.get_plugin_by_id("org.test.Sprawl", None, None).unwrap();
    assert_eq!(plugin.supported_contexts(), vec![keys::CONTEXT_GENERATOR.to_string()]);
}
