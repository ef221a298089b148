//! JVM state chains recorded at safepoints.
//!
//! Each `JVMState` describes one interpreter frame of a safepoint: the method, the bci and
//! where its locals, stack and monitors live among the safepoint's inputs. Inlined frames
//! link to the frame of their caller, so a chain runs from the innermost inlined method
//! out to the method being compiled, whose state has no caller and depth 1.

use std::{fmt::Write as _, io};

use crate::{ci::CiMethod, session::Session, target::Address, Result};

/// Deepest chain accepted before the chain is reported as malformed.
const MAX_JVMS_DEPTH: usize = 1024;

field_table! {
    /// Members of `JVMState`
    pub(crate) struct JvmStateFields = "JVMState" {
        depth: CInt("_depth"),
        locoff: CInt("_locoff"),
        stkoff: CInt("_stkoff"),
        monoff: CInt("_monoff"),
        scloff: CInt("_scloff"),
        endoff: CInt("_endoff"),
        sp: CInt("_sp"),
        bci: CInt("_bci"),
        method: Address("_method"),
        caller: Address("_caller"),
    }
}

/// A view of one `JVMState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JvmState {
    address: Address,
}

macro_rules! jvms_offset {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// # Errors
        ///
        /// Layout and memory errors.
        pub fn $name(&self, session: &Session) -> Result<u32> {
            let state = session.state()?;
            state
                .jvms_fields()?
                .$name
                .read_int::<u32>(state.memory(), self.address)
        }
    };
}

impl JvmState {
    /// Wraps the state at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| JvmState { address })
    }

    /// Address of the state object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    jvms_offset!(
        /// Depth of this frame; the outermost frame has depth 1.
        depth
    );
    jvms_offset!(
        /// Input offset of the first local.
        locoff
    );
    jvms_offset!(
        /// Input offset of the first stack slot.
        stkoff
    );
    jvms_offset!(
        /// Input offset of the first monitor.
        monoff
    );
    jvms_offset!(
        /// Input offset of the first scalar-replaced object.
        scloff
    );
    jvms_offset!(
        /// Input offset past the end of this frame.
        endoff
    );

    /// Expression stack pointer.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn sp(&self, session: &Session) -> Result<i32> {
        let state = session.state()?;
        state
            .jvms_fields()?
            .sp
            .read_int::<i32>(state.memory(), self.address)
    }

    /// Bytecode index of the frame.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn bci(&self, session: &Session) -> Result<i32> {
        let state = session.state()?;
        state
            .jvms_fields()?
            .bci
            .read_int::<i32>(state.memory(), self.address)
    }

    /// Method of the frame; `None` for runtime stubs.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn method(&self, session: &Session) -> Result<Option<CiMethod>> {
        let state = session.state()?;
        let method = state
            .jvms_fields()?
            .method
            .read_address(state.memory(), self.address)?;
        Ok(CiMethod::new(method))
    }

    /// State of the calling frame; `None` for the outermost frame.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn caller(&self, session: &Session) -> Result<Option<JvmState>> {
        let state = session.state()?;
        let caller = state
            .jvms_fields()?
            .caller
            .read_address(state.memory(), self.address)?;
        Ok(JvmState::new(caller))
    }

    /// This frame followed by all its callers, innermost first.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; [`crate::Error::Malformed`] for chains deeper than any
    /// real compilation produces, which indicates a cycle in garbage memory.
    pub fn frames(&self, session: &Session) -> Result<Vec<JvmState>> {
        let mut frames = vec![*self];
        let mut current = *self;
        while let Some(caller) = current.caller(session)? {
            if frames.len() >= MAX_JVMS_DEPTH {
                return Err(malformed_error!(
                    "JVM state chain at {} is deeper than {}",
                    self.address,
                    MAX_JVMS_DEPTH
                ));
            }
            frames.push(caller);
            current = caller;
        }
        Ok(frames)
    }

    /// The chain as printed after a safepoint: one segment per frame, innermost first.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn dump_spec(&self, session: &Session) -> Result<String> {
        let mut spec = String::new();
        self.write_spec(session, &mut spec)?;
        Ok(spec)
    }

    pub(crate) fn write_spec(&self, session: &Session, spec: &mut String) -> Result<()> {
        for frame in self.frames(session)? {
            match frame.method(session)? {
                Some(method) => write!(
                    spec,
                    " {}::{} @ bci:{}",
                    strip_package(&method.holder_name(session)?),
                    method.name(session)?,
                    frame.bci(session)?
                )?,
                None => spec.push_str(" runtime stub"),
            }
        }
        Ok(())
    }

    /// Writes one line per frame, outermost first.
    ///
    /// # Errors
    ///
    /// Layout and memory errors, and [`crate::Error::Io`] if writing fails.
    pub fn dump(&self, session: &Session, out: &mut dyn io::Write) -> Result<()> {
        for frame in self.frames(session)?.iter().rev() {
            let method = match frame.method(session)? {
                Some(method) => method.short_name(session)?,
                None => "(none)".to_string(),
            };
            writeln!(
                out,
                "JVMS depth={} loc={} stk={} mon={} scalar={} end={} sp={} bci={} method={}",
                frame.depth(session)?,
                frame.locoff(session)?,
                frame.stkoff(session)?,
                frame.monoff(session)?,
                frame.scloff(session)?,
                frame.endoff(session)?,
                frame.sp(session)?,
                frame.bci(session)?,
                method
            )?;
        }
        Ok(())
    }
}

/// Drops the package prefix of a class name in internal or external form.
fn strip_package(class_name: &str) -> &str {
    class_name
        .rsplit(['/', '.'])
        .next()
        .unwrap_or(class_name)
}
