//! End-to-end tests: module load, sessions through file handles, unload.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chardev_core::{DeviceState, Error};
use chardev_device::render_message;
use chardev_host::{CharDeviceRegistry, ChardevModule, FileHandle, HostError, ModuleConfig};

fn load() -> (Arc<CharDeviceRegistry>, ChardevModule) {
    let registry = Arc::new(CharDeviceRegistry::new());
    let module = ChardevModule::init(ModuleConfig::default(), &registry).unwrap();
    (registry, module)
}

#[test]
fn test_documented_session_sequence() {
    let (registry, module) = load();
    let number = module.device_number();

    let mut first = FileHandle::open(&registry, number).unwrap();
    let mut head: Vec<u8> = Vec::new();
    assert_eq!(first.read_to(&mut head, 5).unwrap(), 5);
    assert_eq!(head, b"I alr");
    assert_eq!(module.status().cursor, 5);

    assert!(matches!(
        FileHandle::open(&registry, number),
        Err(HostError::Device(Error::AlreadyBusy))
    ));

    first.close().unwrap();
    assert_eq!(module.status().state, DeviceState::Closed);

    let mut second = FileHandle::open(&registry, number).unwrap();
    assert_eq!(module.status().cursor, 0);
    assert_eq!(
        second.read_message().unwrap(),
        b"I already told you 1 times Hello world!\n"
    );
}

#[test]
fn test_module_lifecycle_with_pins() {
    let (registry, module) = load();
    let file = FileHandle::open(&registry, module.device_number()).unwrap();

    let (module, err) = module.cleanup(&registry).unwrap_err();
    assert!(matches!(err, HostError::ModuleBusy { refs: 1, .. }));

    drop(file);
    let number = module.device_number();
    module.cleanup(&registry).unwrap();

    assert!(matches!(
        FileHandle::open(&registry, number),
        Err(HostError::NoSuchDevice { .. })
    ));
}

#[test]
fn test_small_capacity_module_refuses_open() {
    let registry = CharDeviceRegistry::new();
    let config = ModuleConfig {
        message_capacity: 16,
        ..ModuleConfig::default()
    };
    let module = ChardevModule::init(config, &registry).unwrap();

    let err = FileHandle::open(&registry, module.device_number()).unwrap_err();
    assert!(matches!(
        err,
        HostError::Device(Error::MessageTooLong { capacity: 16, .. })
    ));
    assert_eq!(err.errno(), -28);
    assert_eq!(module.ref_count(), 0);
    module.cleanup(&registry).unwrap();
}

#[test]
fn test_two_modules_side_by_side() {
    let registry = CharDeviceRegistry::new();
    let a = ChardevModule::init(ModuleConfig::default(), &registry).unwrap();
    let b = ChardevModule::init(
        ModuleConfig {
            device_name: "chardev2".into(),
            ..ModuleConfig::default()
        },
        &registry,
    )
    .unwrap();
    assert_ne!(a.major(), b.major());

    let _held = FileHandle::open(&registry, a.device_number()).unwrap();
    let mut other = FileHandle::open(&registry, b.device_number()).unwrap();
    assert_eq!(
        other.read_message().unwrap(),
        render_message(0).into_bytes()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_each_get_one_message() {
    const READERS: u64 = 8;

    let (registry, module) = load();
    let number = module.device_number();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..READERS {
        let registry = Arc::clone(&registry);
        tasks.spawn(async move {
            loop {
                match FileHandle::open(&registry, number) {
                    Ok(mut file) => {
                        let mut head: Vec<u8> = Vec::new();
                        file.read_to(&mut head, 3).unwrap();
                        tokio::task::yield_now().await;
                        let mut message = head;
                        message.extend(file.read_message().unwrap());
                        file.close().unwrap();
                        return message;
                    }
                    Err(HostError::Device(e)) if e.is_retryable() => {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                    Err(e) => panic!("unexpected open failure: {e}"),
                }
            }
        });
    }

    let mut seen = BTreeSet::new();
    while let Some(result) = tasks.join_next().await {
        seen.insert(result.unwrap());
    }

    let expected: BTreeSet<Vec<u8>> = (0..READERS)
        .map(|n| render_message(n).into_bytes())
        .collect();
    assert_eq!(seen, expected);
    assert_eq!(module.ref_count(), 0);
    assert_eq!(module.status().open_count, READERS);
}
