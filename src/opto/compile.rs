//! The state of one C2 compilation.
//!
//! [`Compile`] is the entry point into everything the compiler has built so far: the
//! ideal graph through its root node, the scheduled blocks once global code motion has
//! run, and the tree of inlining decisions.

use std::io;

use crate::{
    ci::CiMethod,
    opto::{InlineTree, NodeRc, PhaseCfg},
    session::Session,
    target::Address,
    Result,
};

field_table! {
    /// Members of `Compile`
    pub(crate) struct CompileFields = "Compile" {
        method: Address("_method"),
        compile_id: CInt("_compile_id"),
        entry_bci: CInt("_entry_bci"),
        root: Address("_root"),
        cfg: Address("_cfg"),
        ilt: Address("_ilt"),
    }
}

/// A read-only view of a `Compile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Compile {
    address: Address,
}

impl Compile {
    /// Wraps the compilation at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| Compile { address })
    }

    /// Address of the compilation object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The method being compiled.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn method(&self, session: &Session) -> Result<Option<CiMethod>> {
        let state = session.state()?;
        let method = state
            .compile_fields()?
            .method
            .read_address(state.memory(), self.address)?;
        Ok(CiMethod::new(method))
    }

    /// Compilation id as assigned by the broker.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn compile_id(&self, session: &Session) -> Result<u32> {
        let state = session.state()?;
        state
            .compile_fields()?
            .compile_id
            .read_int::<u32>(state.memory(), self.address)
    }

    /// Entry bci; `-1` for a normal entry, the loop header for on-stack replacement.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn entry_bci(&self, session: &Session) -> Result<i32> {
        let state = session.state()?;
        state
            .compile_fields()?
            .entry_bci
            .read_int::<i32>(state.memory(), self.address)
    }

    /// Root of the ideal graph.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn root(&self, session: &Session) -> Result<Option<NodeRc>> {
        let state = session.state()?;
        let root = state
            .compile_fields()?
            .root
            .read_address(state.memory(), self.address)?;
        session.node_at(root)
    }

    /// The control-flow graph; `None` before global code motion.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn cfg(&self, session: &Session) -> Result<Option<PhaseCfg>> {
        let state = session.state()?;
        let cfg = state
            .compile_fields()?
            .cfg
            .read_address(state.memory(), self.address)?;
        Ok(PhaseCfg::new(cfg))
    }

    /// The inlining tree; `None` until parsing has started.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn ilt(&self, session: &Session) -> Result<Option<InlineTree>> {
        let state = session.state()?;
        let ilt = state
            .compile_fields()?
            .ilt
            .read_address(state.memory(), self.address)?;
        Ok(InlineTree::new(ilt))
    }

    /// Writes the ` inline <count>` section of replay data, if there is a tree.
    ///
    /// # Errors
    ///
    /// Layout and memory errors, and [`crate::Error::Io`] if writing fails.
    pub fn dump_inline_data(&self, session: &Session, out: &mut dyn io::Write) -> Result<()> {
        if let Some(ilt) = self.ilt(session)? {
            write!(out, " inline {}", ilt.count(session)?)?;
            ilt.dump_replay_data(session, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{scheduled_compile, Fixture};

    #[test]
    fn projection() {
        let (fixture, compile) = scheduled_compile();
        let session = fixture.session();
        let compile = Compile::new(compile).unwrap();

        assert_eq!(compile.compile_id(&session).unwrap(), 42);
        assert_eq!(compile.entry_bci(&session).unwrap(), -1);
        assert_eq!(
            compile
                .method(&session)
                .unwrap()
                .unwrap()
                .short_name(&session)
                .unwrap(),
            "com/example/Main::run"
        );
        let root = compile.root(&session).unwrap().unwrap();
        assert_eq!(root.name(), "Root");
        assert!(compile.cfg(&session).unwrap().is_some());
        assert_eq!(
            compile.ilt(&session).unwrap().unwrap().count(&session).unwrap(),
            4
        );
    }

    #[test]
    fn inline_data() {
        let (fixture, compile) = scheduled_compile();
        let session = fixture.session();

        let mut out = Vec::new();
        Compile::new(compile)
            .unwrap()
            .dump_inline_data(&session, &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(" inline 4 0 -1 com/example/Main run ()V 1 3 "));
    }

    #[test]
    fn early_compilation_has_no_tree() {
        let mut fixture = Fixture::new();
        let compile = fixture.compile(None, 7, -1, None, None, None).unwrap();
        let session = fixture.session();
        let compile = Compile::new(compile).unwrap();

        assert!(compile.root(&session).unwrap().is_none());
        assert!(compile.cfg(&session).unwrap().is_none());

        let mut out = Vec::new();
        compile.dump_inline_data(&session, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
