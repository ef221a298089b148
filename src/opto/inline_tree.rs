//! The inlining decisions of a compilation.
//!
//! Every `InlineTree` stands for one method body that was parsed: the root is the method
//! being compiled, each subtree a call site that was inlined into its parent. Besides
//! the tree printout, the tree supplies the `inline` section of compilation replay data.

use std::io;

use crate::{
    ci::CiMethod,
    opto::JvmState,
    session::Session,
    target::Address,
    utils::{escape_replay, TryOnce},
    vm::GrowableArray,
    Result,
};

/// Deepest tree accepted before it is reported as malformed.
const MAX_INLINE_DEPTH: usize = 1024;

field_table! {
    /// Members of `InlineTree`
    pub(crate) struct InlineTreeFields = "InlineTree" {
        caller_jvms: Address("_caller_jvms"),
        method: Address("_method"),
        caller_tree: Address("_caller_tree"),
        subtrees: Embedded("_subtrees"),
    }
}

/// A view of one `InlineTree` node.
///
/// The subtree list is read on first use and cached on the view.
#[derive(Debug)]
pub struct InlineTree {
    address: Address,
    subtrees: TryOnce<Vec<InlineTree>>,
}

impl InlineTree {
    /// Wraps the tree at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| InlineTree {
            address,
            subtrees: TryOnce::new(),
        })
    }

    /// Address of the tree object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The method parsed at this level.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn method(&self, session: &Session) -> Result<Option<CiMethod>> {
        let state = session.state()?;
        let method = state
            .inline_tree_fields()?
            .method
            .read_address(state.memory(), self.address)?;
        Ok(CiMethod::new(method))
    }

    /// State of the call site this method was inlined at; `None` for the root.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn caller_jvms(&self, session: &Session) -> Result<Option<JvmState>> {
        let state = session.state()?;
        let jvms = state
            .inline_tree_fields()?
            .caller_jvms
            .read_address(state.memory(), self.address)?;
        Ok(JvmState::new(jvms))
    }

    /// Bytecode index of the call site, `-1` for the root.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn caller_bci(&self, session: &Session) -> Result<i32> {
        match self.caller_jvms(session)? {
            Some(jvms) => jvms.bci(session),
            None => Ok(-1),
        }
    }

    /// Inlining depth: the depth of the call site's state, `0` for the root.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn inline_level(&self, session: &Session) -> Result<u32> {
        match self.caller_jvms(session)? {
            Some(jvms) => jvms.depth(session),
            None => Ok(0),
        }
    }

    /// The tree this one was inlined into.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn caller_tree(&self, session: &Session) -> Result<Option<InlineTree>> {
        let state = session.state()?;
        let caller = state
            .inline_tree_fields()?
            .caller_tree
            .read_address(state.memory(), self.address)?;
        Ok(InlineTree::new(caller))
    }

    /// Call sites inlined into this method, in parse order.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn subtrees(&self, session: &Session) -> Result<&[InlineTree]> {
        self.subtrees
            .get_or_try_init(|| {
                let state = session.state()?;
                let array = state
                    .inline_tree_fields()?
                    .subtrees
                    .address_in(self.address);
                let Some(array) = GrowableArray::new(array) else {
                    return Ok(Vec::new());
                };
                Ok(array
                    .addresses(session)?
                    .into_iter()
                    .filter_map(InlineTree::new)
                    .collect())
            })
            .map(Vec::as_slice)
    }

    /// Number of trees rooted here, this one included.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; [`crate::Error::Malformed`] for trees deeper than any
    /// real compilation produces.
    pub fn count(&self, session: &Session) -> Result<usize> {
        self.count_at(session, 0)
    }

    fn count_at(&self, session: &Session, depth: usize) -> Result<usize> {
        self.check_depth(depth)?;
        let mut count = 1;
        for subtree in self.subtrees(session)? {
            count += subtree.count_at(session, depth + 1)?;
        }
        Ok(count)
    }

    /// Writes the tree, one ` @ <bci> <holder>::<name>` line per method, children
    /// indented by two more spaces than their parent.
    ///
    /// # Errors
    ///
    /// Layout and memory errors, and [`crate::Error::Io`] if writing fails.
    pub fn print(&self, session: &Session, out: &mut dyn io::Write) -> Result<()> {
        self.print_at(session, out, 0)
    }

    fn print_at(&self, session: &Session, out: &mut dyn io::Write, indent: usize) -> Result<()> {
        self.check_depth(indent / 2)?;
        let name = match self.method(session)? {
            Some(method) => method.short_name(session)?,
            None => "(none)".to_string(),
        };
        writeln!(
            out,
            "{:indent$} @ {} {}",
            "",
            self.caller_bci(session)?,
            name,
            indent = indent
        )?;

        for subtree in self.subtrees(session)? {
            subtree.print_at(session, out, indent + 2)?;
        }
        Ok(())
    }

    /// Writes the inline entries of replay data in pre-order, each as
    /// ` <level> <bci> <holder> <name> <signature>` with the name escaped.
    ///
    /// # Errors
    ///
    /// Layout and memory errors, [`crate::Error::Malformed`] for a tree without a method,
    /// and [`crate::Error::Io`] if writing fails.
    pub fn dump_replay_data(&self, session: &Session, out: &mut dyn io::Write) -> Result<()> {
        self.dump_replay_data_at(session, out, 0)
    }

    fn dump_replay_data_at(
        &self,
        session: &Session,
        out: &mut dyn io::Write,
        depth: usize,
    ) -> Result<()> {
        self.check_depth(depth)?;
        let method = self
            .method(session)?
            .ok_or_else(|| malformed_error!("InlineTree at {} has no method", self.address))?
            .method(session)?;

        write!(
            out,
            " {} {} {} {} {}",
            self.inline_level(session)?,
            self.caller_bci(session)?,
            method.holder_name(session)?,
            escape_replay(&method.name(session)?),
            method.signature(session)?
        )?;

        for subtree in self.subtrees(session)? {
            subtree.dump_replay_data_at(session, out, depth + 1)?;
        }
        Ok(())
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > MAX_INLINE_DEPTH {
            return Err(malformed_error!(
                "InlineTree below {} is deeper than {}",
                self.address,
                MAX_INLINE_DEPTH
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{inline_scenario, Fixture};

    #[test]
    fn count_law() {
        let (fixture, root) = inline_scenario();
        let session = fixture.session();
        let root = InlineTree::new(root).unwrap();

        assert_eq!(root.count(&session).unwrap(), 4);
        let subtrees = root.subtrees(&session).unwrap();
        assert_eq!(subtrees.len(), 2);
        assert_eq!(subtrees[0].count(&session).unwrap(), 2);
        assert_eq!(subtrees[1].count(&session).unwrap(), 1);
        assert!(subtrees[1].subtrees(&session).unwrap().is_empty());
    }

    #[test]
    fn levels_and_callers() {
        let (fixture, root) = inline_scenario();
        let session = fixture.session();
        let root = InlineTree::new(root).unwrap();

        assert_eq!(root.inline_level(&session).unwrap(), 0);
        assert_eq!(root.caller_bci(&session).unwrap(), -1);
        assert!(root.caller_tree(&session).unwrap().is_none());

        let first = &root.subtrees(&session).unwrap()[0];
        assert_eq!(first.inline_level(&session).unwrap(), 1);
        assert_eq!(first.caller_bci(&session).unwrap(), 3);
        assert_eq!(
            first.caller_tree(&session).unwrap().unwrap().address(),
            root.address()
        );
    }

    #[test]
    fn print_indents_children() {
        let (fixture, root) = inline_scenario();
        let session = fixture.session();
        let root = InlineTree::new(root).unwrap();

        let mut out = Vec::new();
        root.print(&session, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            " @ -1 com/example/Main::run\n   @ 3 com/example/Main::<init>\n     @ 1 java/lang/Object::<init>\n   @ 9 java/lang/String::hashCode\n"
        );
    }

    #[test]
    fn replay_entries() {
        let (fixture, root) = inline_scenario();
        let session = fixture.session();
        let root = InlineTree::new(root).unwrap();

        let mut out = Vec::new();
        root.dump_replay_data(&session, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            " 0 -1 com/example/Main run ()V 1 3 com/example/Main <init> ()V 2 1 java/lang/Object <init> ()V 1 9 java/lang/String hashCode ()I"
        );
    }

    #[test]
    fn leaf_without_subtrees() {
        let mut fixture = Fixture::new();
        let method = fixture.ci_method("Leaf", "f", "()V").unwrap();
        let tree = fixture.inline_tree(Some(method), None, None).unwrap();
        let session = fixture.session();

        let tree = InlineTree::new(tree).unwrap();
        assert_eq!(tree.count(&session).unwrap(), 1);
    }
}
