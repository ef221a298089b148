//! Dump commands over the compiler threads of a target.
//!
//! This is the one place where walk errors stop. Everything below propagates failures
//! with `?`; [`run`] catches them per thread, reports them on the output and through the
//! `log` facade, and carries on with the next thread. Only failures of the writer itself
//! abort the command.
//!
//! # Examples
//!
//! ```rust,no_run
//! use optoscope::{commands::{run, DumpCommand}, Address, Session};
//!
//! # fn threads() -> Vec<Address> { Vec::new() }
//! # fn example(session: &Session) -> optoscope::Result<()> {
//! let command: DumpCommand = "dumpideal".parse().unwrap();
//! run(session, command, &threads(), &mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```

use std::io;

use log::{debug, error};
use strum::{Display, EnumIter, EnumString};

use crate::{
    ci::{CiEnv, CompilerThread},
    session::Session,
    target::Address,
    Error, Result,
};

/// Depth of the input walk from the root for [`DumpCommand::Ideal`]; large enough to reach
/// every node of any real graph.
pub const IDEAL_DUMP_DEPTH: i32 = 9999;

/// What to dump for each compiling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum DumpCommand {
    /// The ideal graph, walked from the root
    #[strum(serialize = "dumpideal")]
    Ideal,
    /// The scheduled basic blocks
    #[strum(serialize = "dumpcfg")]
    Cfg,
    /// The inlining tree
    #[strum(serialize = "dumpilt")]
    InlineTree,
    /// The replay line of the compilation
    #[strum(serialize = "dumpreplaydata")]
    ReplayData,
}

/// Runs `command` for every compiler thread among `threads`.
///
/// Each compiler thread gets a header line followed by the dump, or by
/// `  not compiling` when it is idle. Addresses that are null or not compiler threads are
/// skipped.
///
/// # Errors
///
/// Only [`Error::Io`] from writing to `out`. Every other error is reported on `out` and
/// logged, and ends the dump of that thread only.
pub fn run(
    session: &Session,
    command: DumpCommand,
    threads: &[Address],
    out: &mut dyn io::Write,
) -> Result<()> {
    for address in threads {
        let thread = match compiler_thread(session, *address) {
            Ok(Some(thread)) => thread,
            Ok(None) => continue,
            Err(e) => {
                report(command, *address, e, out)?;
                continue;
            }
        };

        writeln!(out, "CompilerThread {}", thread.address())?;
        if let Err(e) = dump_thread(session, command, thread, out) {
            report(command, *address, e, out)?;
        }
    }
    Ok(())
}

fn report(command: DumpCommand, thread: Address, e: Error, out: &mut dyn io::Write) -> Result<()> {
    if let Error::Io(io_error) = e {
        return Err(Error::Io(io_error));
    }
    error!("{} failed for thread {}: {}", command, thread, e);
    writeln!(out, "  error: {e}")?;
    Ok(())
}

/// The thread at `address` if it is a compiler thread.
fn compiler_thread(session: &Session, address: Address) -> Result<Option<CompilerThread>> {
    let Some(thread) = CompilerThread::new(address) else {
        return Ok(None);
    };

    let state = session.state()?;
    let base = state.require_type("CompilerThread")?;
    match state
        .layout()
        .find_dynamic_type(state.memory(), address, &base)?
    {
        Some(_) => Ok(Some(thread)),
        None => {
            debug!("skipping thread {}, not a compiler thread", address);
            Ok(None)
        }
    }
}

fn dump_thread(
    session: &Session,
    command: DumpCommand,
    thread: CompilerThread,
    out: &mut dyn io::Write,
) -> Result<()> {
    let Some(env) = thread.env(session)? else {
        writeln!(out, "  not compiling")?;
        return Ok(());
    };

    match command {
        DumpCommand::ReplayData => env.dump_replay_data(session, out),
        _ => dump_compile(session, command, env, out),
    }
}

fn dump_compile(
    session: &Session,
    command: DumpCommand,
    env: CiEnv,
    out: &mut dyn io::Write,
) -> Result<()> {
    let Some(compile) = env.compiler_data(session)? else {
        writeln!(out, "  not compiling")?;
        return Ok(());
    };

    match command {
        DumpCommand::Ideal => match compile.root(session)? {
            Some(root) => root.dump(session, IDEAL_DUMP_DEPTH, out),
            None => {
                writeln!(out, "  no ideal graph")?;
                Ok(())
            }
        },
        DumpCommand::Cfg => match compile.cfg(session)? {
            Some(cfg) => cfg.dump(session, out),
            None => {
                writeln!(out, "  no CFG")?;
                Ok(())
            }
        },
        DumpCommand::InlineTree => match compile.ilt(session)? {
            Some(ilt) => ilt.print(session, out),
            None => {
                writeln!(out, "  no inline tree")?;
                Ok(())
            }
        },
        DumpCommand::ReplayData => env.dump_replay_data(session, out),
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::test::{compiling_thread, Fixture};

    fn run_to_string(session: &Session, command: DumpCommand, threads: &[Address]) -> String {
        let mut out = Vec::new();
        run(session, command, threads, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn command_names() {
        let names: Vec<String> = DumpCommand::iter().map(|c| c.to_string()).collect();
        assert_eq!(
            names,
            vec!["dumpideal", "dumpcfg", "dumpilt", "dumpreplaydata"]
        );
        assert_eq!(
            "dumpilt".parse::<DumpCommand>().unwrap(),
            DumpCommand::InlineTree
        );
        assert!("dumpall".parse::<DumpCommand>().is_err());
    }

    #[test]
    fn ideal_dump() {
        let (fixture, thread) = compiling_thread();
        let session = fixture.session();

        let text = run_to_string(&session, DumpCommand::Ideal, &[thread]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], format!("CompilerThread {thread}"));
        assert_eq!(
            &lines[1..],
            &[" 1\tStart\t=== [[ 2 ]]", " 2\tReturn\t=== 1 [[ 0 ]]", " 0\tRoot\t=== 2 [[ ]]"]
        );
    }

    #[test]
    fn every_command_runs() {
        let (fixture, thread) = compiling_thread();
        let session = fixture.session();

        assert!(run_to_string(&session, DumpCommand::Cfg, &[thread]).contains("--- CFG --- 2 BBs"));
        assert!(run_to_string(&session, DumpCommand::InlineTree, &[thread])
            .contains("\n @ -1 com/example/Main::run\n"));
        assert!(run_to_string(&session, DumpCommand::ReplayData, &[thread])
            .contains("\ncompile com/example/Main run ()V -1 4 inline 4 "));
    }

    #[test]
    fn idle_and_foreign_threads() {
        let mut fixture = Fixture::new();
        let idle = fixture.compiler_thread(None).unwrap();
        let java = fixture.object("JavaThread").unwrap();
        let session = fixture.session();

        let text = run_to_string(&session, DumpCommand::Ideal, &[Address::NULL, java, idle]);
        assert_eq!(text, format!("CompilerThread {idle}\n  not compiling\n"));
    }

    #[test]
    fn errors_stay_inside_the_thread() {
        let mut fixture = Fixture::new();
        let env = fixture.ci_env(None, None).unwrap();
        let broken = fixture.compiler_thread(Some(env)).unwrap();
        let idle = fixture.compiler_thread(None).unwrap();
        let session = fixture.session();

        let text = run_to_string(&session, DumpCommand::ReplayData, &[broken, idle]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("  error: Malformed"));
        assert_eq!(lines[3], "  not compiling");
    }

    #[test]
    fn unreadable_thread_is_reported() {
        let fixture = Fixture::new();
        let session = fixture.session();

        let text = run_to_string(&session, DumpCommand::Cfg, &[Address::new(0x10)]);
        assert!(text.starts_with("  error: Address 0x0000000000000010 is not mapped"));
    }

    #[test]
    fn writer_failures_propagate() {
        struct Broken;
        impl io::Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let (fixture, thread) = compiling_thread();
        let session = fixture.session();
        assert!(matches!(
            run(&session, DumpCommand::Ideal, &[thread], &mut Broken),
            Err(Error::Io(_))
        ));
    }
}
