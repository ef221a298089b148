//! Integration tests for the session lifecycle: initialization, re-initialization and
//! layout mismatches.

use std::sync::Arc;

use optoscope::{prelude::*, session::FieldRequest, synthetic::SyntheticTarget};

#[test]
fn nothing_resolves_before_initialization() {
    let session = Session::new();
    assert!(!session.is_initialized());

    assert!(matches!(
        session.resolve_field("Node", "_idx", FieldRequest::CInt),
        Err(Error::NotInitialized)
    ));
    assert!(matches!(
        session.node_at(Address::new(0x7f00_0000_0000)),
        Err(Error::NotInitialized)
    ));
    // Null never needs the layout
    assert!(session.node_at(Address::NULL).unwrap().is_none());
}

#[test]
fn descriptors_are_memoized() -> Result<()> {
    let target = SyntheticTarget::new()?;
    let session = target.session()?;

    let first = session.resolve_field("Node", "_idx", FieldRequest::CInt)?;
    let count = session.state()?.descriptor_count();
    let second = session.resolve_field("Node", "_idx", FieldRequest::CInt)?;

    assert_eq!(first, second);
    assert_eq!(first.offset, 0x28);
    assert_eq!(session.state()?.descriptor_count(), count);
    Ok(())
}

#[test]
fn layout_mismatches_are_reported() -> Result<()> {
    let target = SyntheticTarget::new()?;
    let session = target.session()?;

    let missing_type = session
        .resolve_field("NoSuchNode", "_idx", FieldRequest::CInt)
        .unwrap_err();
    assert!(matches!(missing_type, Error::TypeNotFound(_)));

    let missing_field = session
        .resolve_field("Node", "_no_such_field", FieldRequest::Address)
        .unwrap_err();
    assert!(matches!(missing_field, Error::FieldNotFound { .. }));

    let wrong_kind = session
        .resolve_field("Node", "_idx", FieldRequest::Double)
        .unwrap_err();
    assert!(matches!(wrong_kind, Error::WrongFieldKind { .. }));

    for error in [missing_type, missing_field, wrong_kind] {
        assert!(error.is_layout_mismatch());
    }
    Ok(())
}

#[test]
fn reinitialization_starts_over() -> Result<()> {
    let mut first = SyntheticTarget::new()?;
    let node = first.node("AddINode", 1)?;
    let session = first.session()?;

    let before = session.node_at(node)?.unwrap();
    session.resolve_field("Node", "_idx", FieldRequest::CInt)?;
    assert_eq!(session.cached_node_count()?, 1);

    // Same addresses, different object: the old wrapper must not survive
    let mut second = SyntheticTarget::new()?;
    let replacement = second.node("PhiNode", 7)?;
    assert_eq!(replacement, node);
    session.target_initialized(second.target()?)?;

    assert_eq!(session.cached_node_count()?, 0);
    assert_eq!(session.state()?.descriptor_count(), 0);

    let after = session.node_at(node)?.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.kind(), NodeKind::Phi);
    assert_eq!(after.idx(&session)?, 7);
    Ok(())
}

#[test]
fn targets_without_nodes_fail_loudly() -> Result<()> {
    let layout = LayoutDatabase::builder()
        .add_type("Symbol", None, 0x08)
        .build()?;
    let memory = MemoryImage::new(8);
    memory.add_segment(Address::new(0x1000), vec![0; 0x40])?;
    let session = Session::attach(Target::new(Arc::new(memory), Arc::new(layout)));

    let error = session.node_at(Address::new(0x1000)).unwrap_err();
    assert!(matches!(error, Error::TypeNotFound(ref name) if name == "Node"));
    Ok(())
}

#[test]
fn unmapped_nodes_propagate_read_failures() -> Result<()> {
    let target = SyntheticTarget::new()?;
    let session = target.session()?;

    let error = session.node_at(Address::new(0x10)).unwrap_err();
    assert!(matches!(error, Error::UnmappedAddress(_)));
    assert_eq!(session.cached_node_count()?, 0);
    Ok(())
}
