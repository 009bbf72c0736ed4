use gci::{
    default_reader, page_size, platform_policy, total_memory_bytes, GciOptions, Interceptor, MemoryReader,
    ReclamationPolicy, RequestContext,
};

/// The stock reader sees this very process.
#[test]
fn default_reader_reads_self() {
    assert!(page_size() >= 512);
    assert!(total_memory_bytes() > 0);

    let reader = default_reader().unwrap();
    let s = reader.read().unwrap();
    assert!(s.resident_bytes > 0);
    assert!(s.virtual_bytes >= s.resident_bytes);
    assert_eq!(reader.total_bytes(), total_memory_bytes());
}

#[cfg(target_os = "linux")]
#[test]
fn statm_matches_proc_self() {
    let s = gci::StatmReader::current_process();
    assert_eq!(s.path(), std::path::Path::new("/proc/self/statm"));
    assert!(s.read().unwrap().resident_bytes > 0);
}

/// The platform policy can always be asked to collect; disabling may be unsupported.
#[test]
fn platform_policy_collects() {
    let p = platform_policy();
    let disabled = p.disable_automatic();
    if cfg!(all(target_os = "linux", target_env = "gnu")) {
        assert!(disabled.is_ok());
    }
    p.collect_now().unwrap();
}

/// Stock wiring end to end: nothing sheds at the default threshold for a test binary.
#[test]
fn interceptor_with_platform_defaults() {
    let gci = Interceptor::new(GciOptions::default()).unwrap();
    for _ in 0..100 {
        let mut ctx = RequestContext::new();
        assert!(gci.before(&mut ctx).is_none());
        gci.after(&mut ctx);
    }
    assert_eq!(gci.stats().processed, 100);
}
