//! Plugin registration, version resolution and the persisted cache.

mod common;

use std::path::PathBuf;

use common::{broken_get_plugin, broken_plugin_count, test_config, test_get_plugin, test_host, test_plugin_count};
use fxhost::plugin::persist::CacheFile;
use fxhost::property::keys;
use fxhost::{Host, HostError};

#[test]
fn test_static_registration_describes_every_plugin() {
    common::init_logger();
    let host = test_host();
    assert_eq!(host.plugins().len(), 6);

    let blur = host.get_plugin_by_id("org.test.blur", None, None).unwrap();
    assert_eq!(blur.version(), (1, 2));
    assert_eq!(blur.raw_identifier(), "org.test.Blur");
    assert_eq!(blur.identifier(), "org.test.blur");
    assert_eq!(blur.label(), "Blur");
    assert_eq!(blur.supported_contexts(), vec![keys::CONTEXT_FILTER.to_string()]);
    assert_eq!(blur.describe_count(), 1);
    assert!(blur.handle().is_loaded());
}

#[test]
fn test_version_constraints() {
    let host = test_host();
    let old = host.get_plugin_by_id("ORG.TEST.BLUR", Some(1), Some(0)).unwrap();
    assert_eq!(old.version(), (1, 0));
    assert!(host.get_plugin_by_id("org.test.blur", Some(2), None).is_none());
    assert_eq!(host.get_plugin_by_id("org.test.blur", Some(1), None).unwrap().version(), (1, 2));

    let by_label = host.get_plugin_by_label("Blur", None, None).unwrap();
    assert_eq!(by_label.version(), (1, 2));
    assert!(host.get_plugin_by_label("blur", None, None).is_none());

    let latest = host.cache().plugins_by_id();
    assert_eq!(latest.len(), 5);
}

#[test]
fn test_broken_binaries_are_reported_not_fatal() {
    let host = test_host();
    let report = host.register_static("brokenfx", broken_plugin_count, broken_get_plugin);
    assert_eq!(report.described, 0);
    assert_eq!(report.failures.len(), 3);
    assert!(
        report
            .failures
            .iter()
            .all(|f| f.path == PathBuf::from("static:brokenfx"))
    );
    let reasons: Vec<&str> = report.failures.iter().map(|f| f.reason.as_str()).collect();
    assert!(reasons[0].contains("load action returned"), "{reasons:?}");
    assert!(reasons[1].contains("Describe action failed"), "{reasons:?}");
    assert!(reasons[2].contains("unsupported API"), "{reasons:?}");

    assert!(host.get_plugin_by_id("org.test.nodescribe", None, None).is_none());
    assert_eq!(host.plugins().len(), 6);

    // Registering the same binary again is a no-op.
    let again = host.register_static("brokenfx", broken_plugin_count, broken_get_plugin);
    assert_eq!(again, Default::default());
}

#[test]
fn test_context_descriptor_is_cached_on_the_plugin() {
    let host = test_host();
    let blur = host.get_plugin_by_id("org.test.blur", None, None).unwrap();
    let first = blur.context_descriptor(keys::CONTEXT_FILTER).unwrap();
    let second = blur.context_descriptor(keys::CONTEXT_FILTER).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    let params: Vec<&str> = first.params().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["radius", "size", "mode", "label"]);
    assert_eq!(
        first.properties().get_string(keys::CONTEXT, 0).unwrap(),
        keys::CONTEXT_FILTER
    );

    let err = blur.context_descriptor(keys::CONTEXT_GENERATOR).unwrap_err();
    assert!(matches!(err, HostError::ContextUnsupported { .. }));
}

#[test]
fn test_cache_round_trip_skips_describe() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plugins.json");

    let first = test_host();
    let blur = first.get_plugin_by_id("org.test.blur", None, None).unwrap();
    let filter = blur.context_descriptor(keys::CONTEXT_FILTER).unwrap();
    first.save_cache(&path).unwrap();

    let second = Host::new(test_config()).unwrap();
    assert_eq!(second.load_persisted(&path).unwrap(), 1);
    let report = second.register_static("testfx", test_plugin_count, test_get_plugin);
    assert_eq!(report.cached, 6);
    assert_eq!(report.described, 0);

    for (original, restored) in first.plugins().iter().zip(second.plugins().iter()) {
        assert_eq!(original.identity(), restored.identity());
        assert_eq!(restored.describe_count(), 0);
        assert!(!restored.handle().is_loaded());
        assert_eq!(
            original.description().unwrap().as_ref(),
            restored.description().unwrap().as_ref()
        );
    }

    let restored = second.get_plugin_by_id("org.test.blur", None, None).unwrap();
    let contexts = restored.described_contexts();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].0, keys::CONTEXT_FILTER);
    assert_eq!(contexts[0].1.as_ref(), filter.as_ref());

    // The cached context needs Load but not Describe.
    let instance = restored.create_instance(keys::CONTEXT_FILTER).unwrap();
    assert_eq!(instance.params().len(), 4);
    assert_eq!(restored.describe_count(), 0);

    // A context never described before makes the binary see Describe first.
    let bitdepth = second.get_plugin_by_id("org.test.bitdepth", None, None).unwrap();
    let general = bitdepth.context_descriptor(keys::CONTEXT_GENERAL).unwrap();
    assert_eq!(bitdepth.describe_count(), 1);
    assert!(general.clip("Mask").unwrap().is_optional());
}

#[test]
fn test_changed_binary_is_described_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plugins.json");
    test_host().save_cache(&path).unwrap();

    let mut file = CacheFile::read(&path).unwrap();
    file.binaries[0].identity.mtime = 42;
    file.write(&path).unwrap();

    let host = Host::new(test_config()).unwrap();
    host.load_persisted(&path).unwrap();
    let report = host.register_static("testfx", test_plugin_count, test_get_plugin);
    assert_eq!(report.cached, 0);
    assert_eq!(report.described, 6);
}

#[test]
fn test_dump_lists_plugins() {
    let host = test_host();
    let blur = host.get_plugin_by_id("org.test.blur", None, None).unwrap();
    blur.context_descriptor(keys::CONTEXT_FILTER).unwrap();
    let dump = host.cache().dump();
    assert!(dump.contains("org.test.Blur v1.2 [static:testfx#4]"), "{dump}");
    assert!(dump.contains("filter clips: Output, Source"), "{dump}");
}

#[test]
fn test_host_properties_are_read_only() {
    let host = test_host();
    let properties = host.properties();
    assert_eq!(properties.get_string(keys::HOST_NAME, 0).unwrap(), fxhost::host::HOST_NAME);
    assert_eq!(properties.get_doubles(keys::HOST_PROJECT_SIZE).unwrap(), vec![8.0, 4.0]);
    assert!(properties.spec(keys::HOST_NAME).unwrap().read_only);
}
