//! Tests for the attachment lifecycle, variant selection and derived state

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use common::{Event, MockPlatform, MockTarget, QueryApi, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, PEB_32, PEB_64};
use tether_core::error::TetherError;
use tether_core::imports::{DepFlags, DepPolicy, DynamicImports};
use tether_core::native::{ExtendedProcessFlags, NativeKind, NativeQuery, ProcessInfoClass};
use tether_core::types::{BarrierKind, NativeArchitecture, NtStatus, PointerWidth, ProcessAccess, ProcessId, RawHandle};
use tether_core::ProcessAttachment;

const NATIVE_PID: u32 = 200;
const WOW64_PID: u32 = 300;

fn attachment(platform: &Arc<MockPlatform>) -> ProcessAttachment
{
    ProcessAttachment::new(platform.clone(), DynamicImports::none())
}

fn dep_imports(flags: DepFlags) -> DynamicImports
{
    DynamicImports::none().with_dep_policy(move |_handle: RawHandle| -> io::Result<DepPolicy> {
        Ok(DepPolicy { flags, permanent: true })
    })
}

/// DEP capability reporting `flags`, plus a count of how often it was asked.
fn counting_dep_imports(flags: DepFlags) -> (DynamicImports, Arc<Mutex<usize>>)
{
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let imports = DynamicImports::none().with_dep_policy(move |_handle: RawHandle| -> io::Result<DepPolicy> {
        *counter.lock().unwrap() += 1;
        Ok(DepPolicy { flags, permanent: false })
    });
    (imports, calls)
}

#[test]
fn test_close_twice_is_same_as_once()
{
    let platform = MockPlatform::x64_native().with_target(NATIVE_PID, MockTarget::native()).into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();
    attachment.close();
    attachment.close();

    assert!(!attachment.is_attached());
    assert_eq!(platform.opened(), 1);
    assert_eq!(platform.closed(), 1);
    assert_eq!(platform.open_handles(), 0);
}

#[test]
fn test_close_on_fresh_attachment_does_nothing()
{
    let platform = MockPlatform::x64_native().into_arc();
    let mut attachment = attachment(&platform);

    attachment.close();

    assert!(platform.events().is_empty());
}

#[test]
fn test_reopen_releases_previous_target_first()
{
    let platform = MockPlatform::x64_native()
        .with_target(NATIVE_PID, MockTarget::native())
        .with_target(WOW64_PID, MockTarget::wow64())
        .into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();
    let first = attachment.handle().unwrap();
    attachment.open(ProcessId(WOW64_PID), ProcessAccess::QUERY_LIMITED_INFORMATION).unwrap();
    let second = attachment.handle().unwrap();

    assert_eq!(
        platform.events(),
        vec![
            Event::Open {
                pid: ProcessId(NATIVE_PID),
                access: ProcessAccess::DEFAULT,
                handle: first,
            },
            Event::Close { handle: first },
            Event::Open {
                pid: ProcessId(WOW64_PID),
                access: ProcessAccess::QUERY_LIMITED_INFORMATION,
                handle: second,
            },
        ]
    );
    assert_eq!(attachment.pid(), ProcessId(WOW64_PID));
    assert_eq!(platform.open_handles(), 1);
}

#[test]
fn test_self_attach_uses_pseudo_handle_for_any_access()
{
    let platform = MockPlatform::x64_native().into_arc();
    let mut attachment = attachment(&platform);

    let masks = [
        ProcessAccess::empty(),
        ProcessAccess::DEFAULT,
        ProcessAccess::ALL,
        ProcessAccess::from_bits_retain(0xDEAD_BEEF),
    ];
    for access in masks {
        attachment.open(MockPlatform::SELF_PID, access).unwrap();
        assert_eq!(attachment.pid(), MockPlatform::SELF_PID);
        assert_eq!(attachment.handle(), Some(RawHandle::CURRENT_PROCESS));
        assert_eq!(attachment.native().map(|native| native.kind()), Some(NativeKind::X64));
    }
    attachment.close();

    // The pseudo handle is never opened or closed
    assert_eq!(platform.opened(), 0);
    assert_eq!(platform.closed(), 0);
}

#[test]
fn test_self_attach_from_wow64_controller()
{
    let platform = MockPlatform::x64_wow64_controller().into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(MockPlatform::SELF_PID, ProcessAccess::empty()).unwrap();

    let barrier = attachment.barrier().unwrap();
    assert_eq!(barrier.kind, BarrierKind::Wow64ToWow64);
    assert!(!barrier.mismatch);
    assert_eq!(attachment.native().unwrap().kind(), NativeKind::Wow64Bridge);
}

#[test]
fn test_native_target_has_dep_enabled()
{
    let platforms = [
        MockPlatform::x64_native().with_target(NATIVE_PID, MockTarget::native()),
        MockPlatform::x64_wow64_controller().with_target(NATIVE_PID, MockTarget::native()),
        MockPlatform::x86().with_target(NATIVE_PID, MockTarget::native()),
    ];

    for platform in platforms {
        let platform = platform.into_arc();
        // No DEP capability at all: native targets never need it
        let mut attachment = attachment(&platform);
        attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();

        assert!(attachment.dep_enabled());
        assert_eq!(attachment.dep_policy(), None);
    }
}

#[test]
fn test_detached_defaults()
{
    let platform = MockPlatform::x64_native().with_target(NATIVE_PID, MockTarget::native().protected()).into_arc();
    let mut attachment = attachment(&platform);

    let check = |attachment: &ProcessAttachment| {
        assert!(!attachment.is_attached());
        assert!(attachment.pid().is_none());
        assert_eq!(attachment.handle(), None);
        assert!(attachment.native().is_none());
        assert!(attachment.barrier().is_none());
        assert!(!attachment.dep_enabled());
        assert!(!attachment.is_protected());
        assert!(matches!(attachment.extended_flags(), Err(TetherError::NotAttached)));
        assert!(matches!(attachment.basic_information(), Err(TetherError::NotAttached)));
    };

    check(&attachment);

    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();
    assert!(attachment.is_protected());
    attachment.close();

    check(&attachment);
}

#[test]
fn test_native_controller_uses_x64_for_wow64_target()
{
    let platform = MockPlatform::x64_native().with_target(WOW64_PID, MockTarget::wow64()).into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(ProcessId(WOW64_PID), ProcessAccess::DEFAULT).unwrap();

    let native = attachment.native().unwrap();
    assert_eq!(native.kind(), NativeKind::X64);
    assert_eq!(native.pointer_width(), PointerWidth::Bits64);
    assert_eq!(native.barrier().kind, BarrierKind::Native64ToWow64);
    assert!(native.barrier().mismatch);
    assert_eq!(native.barrier().target_width(), PointerWidth::Bits32);

    let info = attachment.basic_information().unwrap();
    assert_eq!(info.peb_base_address, PEB_64);
    assert_eq!(info.unique_process_id, u64::from(WOW64_PID));
    assert_eq!(platform.queries(), vec![(QueryApi::Native, 48)]);
}

#[test]
fn test_wow64_controller_bridges_to_native_target()
{
    let platform = MockPlatform::x64_wow64_controller().with_target(NATIVE_PID, MockTarget::native()).into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();

    let native = attachment.native().unwrap();
    assert_eq!(native.kind(), NativeKind::Wow64Bridge);
    assert_eq!(native.barrier().kind, BarrierKind::Wow64ToNative64);
    assert!(native.barrier().mismatch);

    // Only the 64-bit thunk sees native structures; the direct query would
    // answer in the 32-bit layout and reject a 64-bit buffer
    let flags = attachment.extended_flags().unwrap();
    assert!(!flags.contains(ExtendedProcessFlags::IS_WOW64_PROCESS));
    assert_eq!(platform.queries(), vec![(QueryApi::Wow64Thunk, 64)]);
}

#[test]
fn test_wow64_controller_bridges_to_wow64_target()
{
    let platform = MockPlatform::x64_wow64_controller().with_target(WOW64_PID, MockTarget::wow64()).into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(ProcessId(WOW64_PID), ProcessAccess::DEFAULT).unwrap();

    let native = attachment.native().unwrap();
    assert_eq!(native.kind(), NativeKind::Wow64Bridge);
    assert_eq!(native.barrier().kind, BarrierKind::Wow64ToWow64);
    assert!(!native.barrier().mismatch);

    let flags = attachment.extended_flags().unwrap();
    assert!(flags.contains(ExtendedProcessFlags::IS_WOW64_PROCESS));
}

#[test]
fn test_x86_os_uses_32bit_layout()
{
    let platform = MockPlatform::x86().with_target(NATIVE_PID, MockTarget::native()).into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();

    let native = attachment.native().unwrap();
    assert_eq!(native.kind(), NativeKind::X86);
    assert_eq!(native.pointer_width(), PointerWidth::Bits32);
    let barrier = native.barrier();
    assert_eq!(barrier.kind, BarrierKind::Native32);
    assert!(barrier.x86_os);
    assert!(!barrier.target_wow64);
    assert!(attachment.dep_enabled());

    let info = attachment.basic_information().unwrap();
    assert_eq!(info.peb_base_address, PEB_32);
    assert_eq!(info.inherited_from_unique_process_id, 4);
    assert_eq!(platform.queries(), vec![(QueryApi::Native, 24)]);
}

#[test]
fn test_x86_os_target_has_dep_enabled_without_asking()
{
    let platform = MockPlatform::x86().with_target(NATIVE_PID, MockTarget::native()).into_arc();
    let (imports, calls) = counting_dep_imports(DepFlags::empty());
    let mut attachment = ProcessAttachment::new(platform.clone(), imports);

    // The target WOW64 state is not queried on a 32-bit OS, so query rights are not needed
    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::VM_READ).unwrap();

    assert!(attachment.dep_enabled());
    assert_eq!(attachment.dep_policy(), None);
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn test_unknown_target_bitness_fails_closed()
{
    let platform = MockPlatform::x64_native().with_target(WOW64_PID, MockTarget::wow64()).into_arc();
    let (imports, calls) = counting_dep_imports(DepFlags::empty());
    let mut attachment = ProcessAttachment::new(platform.clone(), imports);

    let err = attachment.open(ProcessId(WOW64_PID), ProcessAccess::VM_READ).unwrap_err();

    match &err {
        TetherError::TargetArchitectureUnknown { pid, .. } => assert_eq!(*pid, ProcessId(WOW64_PID)),
        other => panic!("Expected TargetArchitectureUnknown, got {other:?}"),
    }
    assert_eq!(err.raw_os_error(), Some(ERROR_ACCESS_DENIED));
    assert!(!attachment.is_attached());
    assert!(!attachment.dep_enabled());
    assert_eq!(attachment.barrier(), None);
    assert_eq!(*calls.lock().unwrap(), 0);
    assert_eq!(platform.opened(), 1);
    assert_eq!(platform.open_handles(), 0);
}

#[test]
fn test_pid_zero_is_rejected_before_the_os()
{
    let platform = MockPlatform::x64_native().with_target(0, MockTarget::native()).into_arc();
    let mut attachment = attachment(&platform);

    let err = attachment.open(ProcessId::NONE, ProcessAccess::DEFAULT).unwrap_err();

    assert!(matches!(err, TetherError::AttachFailed { pid: ProcessId::NONE, .. }), "got {err:?}");
    assert_eq!(err.raw_os_error(), Some(ERROR_INVALID_PARAMETER));
    assert!(!attachment.is_attached());
    assert!(platform.events().is_empty());
}

#[test]
fn test_unsupported_combination_releases_handle()
{
    let platforms = [
        // 32-bit controller on 64-bit Windows without WOW64
        MockPlatform::new(NativeArchitecture::X64, PointerWidth::Bits32, false),
        // IA64
        MockPlatform::new(NativeArchitecture::Unknown(6), PointerWidth::Bits64, false),
    ];

    for platform in platforms {
        let platform = platform.with_target(NATIVE_PID, MockTarget::native()).into_arc();
        let mut attachment = attachment(&platform);

        let err = attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap_err();

        assert!(matches!(err, TetherError::UnsupportedArchitectureCombination { .. }), "got {err:?}");
        assert!(!attachment.is_attached());
        assert_eq!(platform.opened(), 1);
        assert_eq!(platform.closed(), 1);
        assert_eq!(platform.open_handles(), 0);
    }
}

#[test]
fn test_wow64_target_dep_from_capability()
{
    let platform = MockPlatform::x64_native().with_target(WOW64_PID, MockTarget::wow64()).into_arc();

    let mut enabled = ProcessAttachment::new(platform.clone(), dep_imports(DepFlags::ENABLE | DepFlags::DISABLE_ATL_THUNK_EMULATION));
    enabled.open(ProcessId(WOW64_PID), ProcessAccess::DEFAULT).unwrap();
    assert!(enabled.dep_enabled());
    assert!(enabled.dep_policy().unwrap().permanent);

    let mut disabled = ProcessAttachment::new(platform.clone(), dep_imports(DepFlags::empty()));
    disabled.open(ProcessId(WOW64_PID), ProcessAccess::DEFAULT).unwrap();
    assert!(!disabled.dep_enabled());
    assert_eq!(disabled.dep_policy().unwrap().flags, DepFlags::empty());
}

#[test]
fn test_wow64_target_dep_capability_receives_target_handle()
{
    let platform = MockPlatform::x64_native().with_target(WOW64_PID, MockTarget::wow64()).into_arc();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let recorder = Arc::clone(&seen);
    let imports = DynamicImports::none().with_dep_policy(move |handle: RawHandle| -> io::Result<DepPolicy> {
        recorder.lock().unwrap().push(handle);
        Ok(DepPolicy {
            flags: DepFlags::ENABLE,
            permanent: false,
        })
    });

    let mut attachment = ProcessAttachment::new(platform.clone(), imports);
    attachment.open(ProcessId(WOW64_PID), ProcessAccess::DEFAULT).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![attachment.handle().unwrap()]);
}

#[test]
fn test_wow64_target_dep_false_without_capability()
{
    let platform = MockPlatform::x64_native().with_target(WOW64_PID, MockTarget::wow64()).into_arc();

    let mut missing = attachment(&platform);
    missing.open(ProcessId(WOW64_PID), ProcessAccess::DEFAULT).unwrap();
    assert!(missing.is_attached());
    assert!(!missing.dep_enabled());
    assert_eq!(missing.dep_policy(), None);

    let failing = DynamicImports::none().with_dep_policy(|_handle: RawHandle| -> io::Result<DepPolicy> {
        Err(io::Error::from_raw_os_error(ERROR_ACCESS_DENIED))
    });
    let mut failed = ProcessAttachment::new(platform.clone(), failing);
    failed.open(ProcessId(WOW64_PID), ProcessAccess::DEFAULT).unwrap();
    assert!(failed.is_attached());
    assert!(!failed.dep_enabled());
}

#[test]
fn test_attach_failure_keeps_os_error_code()
{
    let platform = MockPlatform::x64_native().with_target(NATIVE_PID, MockTarget::native().denied()).into_arc();
    let mut attachment = attachment(&platform);

    let err = attachment.open(ProcessId(NATIVE_PID), ProcessAccess::ALL).unwrap_err();
    match &err {
        TetherError::AttachFailed { pid, source } => {
            assert_eq!(*pid, ProcessId(NATIVE_PID));
            assert_eq!(source.raw_os_error(), Some(ERROR_ACCESS_DENIED));
        }
        other => panic!("Expected AttachFailed, got {other:?}"),
    }
    assert_eq!(err.raw_os_error(), Some(ERROR_ACCESS_DENIED));

    let err = attachment.open(ProcessId(4242), ProcessAccess::DEFAULT).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(ERROR_INVALID_PARAMETER));
    assert!(!attachment.is_attached());
}

#[test]
fn test_failed_reopen_leaves_attachment_detached()
{
    let platform = MockPlatform::x64_native()
        .with_target(NATIVE_PID, MockTarget::native())
        .with_target(WOW64_PID, MockTarget::wow64().denied())
        .into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();
    assert!(attachment.open(ProcessId(WOW64_PID), ProcessAccess::DEFAULT).is_err());

    assert!(!attachment.is_attached());
    assert_eq!(attachment.pid(), ProcessId::NONE);
    assert_eq!(platform.open_handles(), 0);
}

#[test]
fn test_is_protected_reads_extended_flags()
{
    let platform = MockPlatform::x64_native()
        .with_target(NATIVE_PID, MockTarget::native().protected())
        .with_target(WOW64_PID, MockTarget::wow64())
        .into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::QUERY_LIMITED_INFORMATION).unwrap();
    assert!(attachment.is_protected());

    attachment.open(ProcessId(WOW64_PID), ProcessAccess::QUERY_LIMITED_INFORMATION).unwrap();
    assert!(!attachment.is_protected());

    // Extended queries carry their own size in the 64-bit layout
    assert_eq!(platform.queries(), vec![(QueryApi::Native, 64), (QueryApi::Native, 64)]);
}

#[test]
fn test_is_protected_false_when_query_fails()
{
    let target = MockTarget::native().protected().failing_queries(NtStatus::ACCESS_DENIED);
    let platform = MockPlatform::x64_native().with_target(NATIVE_PID, target).into_arc();
    let mut attachment = attachment(&platform);

    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();

    assert!(!attachment.is_protected());
    match attachment.extended_flags() {
        Err(TetherError::QueryFailed { class, status }) => {
            assert_eq!(class, ProcessInfoClass::BasicInformation);
            assert_eq!(status, NtStatus::ACCESS_DENIED);
        }
        other => panic!("Expected QueryFailed, got {other:?}"),
    }
}

#[test]
fn test_drop_closes_handle()
{
    let platform = MockPlatform::x64_native().with_target(NATIVE_PID, MockTarget::native()).into_arc();

    {
        let mut attachment = attachment(&platform);
        attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();
        assert_eq!(platform.open_handles(), 1);
    }

    assert_eq!(platform.open_handles(), 0);
    assert_eq!(platform.closed(), 1);
}

#[test]
fn test_independent_attachments_to_same_target()
{
    let platform = MockPlatform::x64_native().with_target(NATIVE_PID, MockTarget::native()).into_arc();
    let mut first = attachment(&platform);
    let mut second = attachment(&platform);

    first.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();
    second.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();
    assert_ne!(first.handle(), second.handle());

    first.close();
    assert!(second.basic_information().is_ok());
    assert_eq!(platform.open_handles(), 1);
}

#[test]
fn test_raw_query_through_native_interface()
{
    let platform = MockPlatform::x64_native().with_target(NATIVE_PID, MockTarget::native()).into_arc();
    let mut attachment = attachment(&platform);
    attachment.open(ProcessId(NATIVE_PID), ProcessAccess::DEFAULT).unwrap();

    let native = attachment.native().unwrap();
    let mut buffer = [0u8; 16];
    match native.query_process_info(ProcessInfoClass::BasicInformation, &mut buffer) {
        Err(TetherError::QueryFailed { status, .. }) => assert_eq!(status, NtStatus::INFO_LENGTH_MISMATCH),
        other => panic!("Expected QueryFailed, got {other:?}"),
    }
}
