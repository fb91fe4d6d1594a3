//! Explicit global initialization. Kept in its own binary so nothing touches
//! the global allocator first.

use linkage::{ConfigError, LinkAllocator, LinkConfig, LockFreeStack};

#[test]
fn test_init_global_once() {
    let invalid = LinkConfig {
        max_links: 1,
        ..LinkConfig::default()
    };
    assert!(matches!(
        LinkAllocator::init_global(invalid),
        Err(ConfigError::InvalidCapacity(1))
    ));

    let config = LinkConfig::from_json(r#"{"max_links": 65536}"#).unwrap();
    let allocator = LinkAllocator::init_global(config).unwrap();
    assert_eq!(allocator.stats().capacity, 65_536);
    assert!(std::ptr::eq(allocator, LinkAllocator::global()));

    let stack = LockFreeStack::new();
    stack.push(Box::new(1u64));
    assert!(allocator.stats().reserved_links > 0);
    assert!(allocator.stats().utilization() > 0.0);
    drop(stack);

    assert!(matches!(
        LinkAllocator::init_global(LinkConfig::default()),
        Err(ConfigError::AlreadyInitialized)
    ));
}
