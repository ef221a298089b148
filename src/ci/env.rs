use std::io;

use crate::{
    oops::Method,
    opto::Compile,
    session::Session,
    target::Address,
    utils::escape_replay,
    Result,
};

field_table! {
    /// Members of `ciEnv`
    pub(crate) struct CiEnvFields = "ciEnv" {
        compiler_data: Address("_compiler_data"),
        task: Address("_task"),
    }
}

field_table! {
    /// Members of `CompileTask`
    pub(crate) struct CompileTaskFields = "CompileTask" {
        compile_id: CInt("_compile_id"),
        comp_level: CInt("_comp_level"),
        osr_bci: CInt("_osr_bci"),
        method: Address("_method"),
    }
}

field_table! {
    /// Members of `CompilerThread`
    pub(crate) struct CompilerThreadFields = "CompilerThread" {
        env: Address("_env"),
    }
}

/// A view of a `CompilerThread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompilerThread {
    address: Address,
}

impl CompilerThread {
    /// Wraps the thread at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| CompilerThread { address })
    }

    /// Address of the thread object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The compiler environment; `None` while the thread is idle.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn env(&self, session: &Session) -> Result<Option<CiEnv>> {
        let state = session.state()?;
        let env = state
            .compiler_thread_fields()?
            .env
            .read_address(state.memory(), self.address)?;
        Ok(CiEnv::new(env))
    }
}

/// A view of the `ciEnv` a compiler thread works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CiEnv {
    address: Address,
}

impl CiEnv {
    /// Wraps the environment at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| CiEnv { address })
    }

    /// Address of the environment object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The C2 compilation running in this environment.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn compiler_data(&self, session: &Session) -> Result<Option<Compile>> {
        let state = session.state()?;
        let compile = state
            .ci_env_fields()?
            .compiler_data
            .read_address(state.memory(), self.address)?;
        Ok(Compile::new(compile))
    }

    /// The task being compiled.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn task(&self, session: &Session) -> Result<Option<CompileTask>> {
        let state = session.state()?;
        let task = state
            .ci_env_fields()?
            .task
            .read_address(state.memory(), self.address)?;
        Ok(CompileTask::new(task))
    }

    /// Writes the replay line of the current compilation:
    /// `compile <holder> <name> <signature> <osr bci> <level>`, followed by the inline
    /// section when the compilation has an inlining tree.
    ///
    /// # Errors
    ///
    /// Layout and memory errors, [`crate::Error::Malformed`] for an environment without a
    /// task or method, and [`crate::Error::Io`] if writing fails.
    pub fn dump_replay_data(&self, session: &Session, out: &mut dyn io::Write) -> Result<()> {
        let task = self
            .task(session)?
            .ok_or_else(|| malformed_error!("ciEnv at {} has no task", self.address))?;
        let method = task.method(session)?.ok_or_else(|| {
            malformed_error!("CompileTask at {} has no method", task.address())
        })?;

        write!(
            out,
            "compile {} {} {} {} {}",
            method.holder_name(session)?,
            escape_replay(&method.name(session)?),
            method.signature(session)?,
            task.osr_bci(session)?,
            task.comp_level(session)?
        )?;

        if let Some(compile) = self.compiler_data(session)? {
            compile.dump_inline_data(session, out)?;
        }
        writeln!(out)?;
        Ok(())
    }
}

/// A view of a `CompileTask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompileTask {
    address: Address,
}

impl CompileTask {
    /// Wraps the task at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| CompileTask { address })
    }

    /// Address of the task object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Compilation id.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn compile_id(&self, session: &Session) -> Result<u32> {
        let state = session.state()?;
        state
            .compile_task_fields()?
            .compile_id
            .read_int::<u32>(state.memory(), self.address)
    }

    /// Tiered compilation level.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn comp_level(&self, session: &Session) -> Result<i32> {
        let state = session.state()?;
        state
            .compile_task_fields()?
            .comp_level
            .read_int::<i32>(state.memory(), self.address)
    }

    /// Entry bci for on-stack replacement, `-1` for a normal compilation.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn osr_bci(&self, session: &Session) -> Result<i32> {
        let state = session.state()?;
        state
            .compile_task_fields()?
            .osr_bci
            .read_int::<i32>(state.memory(), self.address)
    }

    /// The method being compiled.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn method(&self, session: &Session) -> Result<Option<Method>> {
        let state = session.state()?;
        let method = state
            .compile_task_fields()?
            .method
            .read_address(state.memory(), self.address)?;
        Ok(Method::new(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{compiling_thread, Fixture};

    #[test]
    fn thread_to_compile() {
        let (fixture, thread) = compiling_thread();
        let session = fixture.session();

        let env = CompilerThread::new(thread)
            .unwrap()
            .env(&session)
            .unwrap()
            .unwrap();
        let task = env.task(&session).unwrap().unwrap();
        assert_eq!(task.compile_id(&session).unwrap(), 42);
        assert_eq!(task.comp_level(&session).unwrap(), 4);
        assert_eq!(task.osr_bci(&session).unwrap(), -1);
        let compile = env.compiler_data(&session).unwrap().unwrap();
        assert_eq!(compile.compile_id(&session).unwrap(), 42);
    }

    #[test]
    fn replay_line() {
        let (fixture, thread) = compiling_thread();
        let session = fixture.session();
        let env = CompilerThread::new(thread)
            .unwrap()
            .env(&session)
            .unwrap()
            .unwrap();

        let mut out = Vec::new();
        env.dump_replay_data(&session, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("compile com/example/Main run ()V -1 4 inline 4 0 -1 "));
        assert!(text.ends_with(" java/lang/String hashCode ()I\n"));
    }

    #[test]
    fn idle_thread() {
        let mut fixture = Fixture::new();
        let thread = fixture.compiler_thread(None).unwrap();
        let session = fixture.session();

        assert!(CompilerThread::new(thread)
            .unwrap()
            .env(&session)
            .unwrap()
            .is_none());
    }

    #[test]
    fn env_without_task_is_malformed() {
        let mut fixture = Fixture::new();
        let env = fixture.ci_env(None, None).unwrap();
        let session = fixture.session();

        let mut out = Vec::new();
        assert!(CiEnv::new(env)
            .unwrap()
            .dump_replay_data(&session, &mut out)
            .is_err());
    }
}
