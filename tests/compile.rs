//! Integration tests for a complete compilation: inline tree, CFG, compile environment
//! and the dump commands over compiler threads.

use std::sync::Arc;

use optoscope::{
    commands::{run, DumpCommand},
    prelude::*,
    synthetic::SyntheticTarget,
};

struct Scenario {
    target: SyntheticTarget,
    thread: Address,
    compile: Address,
    ilt: Address,
}

/// Compilation 42 of `Main::run`, tier 4, with the inline tree
///
///   Main::run
///     @ 3 Main::<init>
///       @ 1 Object::<init>
///     @ 9 String::hashCode
///
/// and the graph Start (1) -> Return (2) -> Root (0) scheduled into two blocks.
fn scenario() -> Result<Scenario> {
    let mut target = SyntheticTarget::new()?;

    let run = target.ci_method("com/example/Main", "run", "()V")?;
    let init = target.ci_method("com/example/Main", "<init>", "()V")?;
    let object_init = target.ci_method("java/lang/Object", "<init>", "()V")?;
    let hash = target.ci_method("java/lang/String", "hashCode", "()I")?;

    let ilt = target.inline_tree(Some(run), None, None)?;
    let init_site = target.jvms(Some(run), 3, None)?;
    let init_tree = target.inline_tree(Some(init), Some(init_site), Some(ilt))?;
    let object_site = target.jvms(Some(init), 1, Some(init_site))?;
    let object_tree = target.inline_tree(Some(object_init), Some(object_site), Some(init_tree))?;
    let hash_site = target.jvms(Some(run), 9, None)?;
    let hash_tree = target.inline_tree(Some(hash), Some(hash_site), Some(ilt))?;
    target.set_subtrees(ilt, &[init_tree, hash_tree])?;
    target.set_subtrees(init_tree, &[object_tree])?;

    let root = target.node("RootNode", 0)?;
    let start = target.node("StartNode", 1)?;
    let ret = target.node("ReturnNode", 2)?;
    target.set_inputs(ret, &[start], &[])?;
    target.set_outputs(start, &[ret])?;
    target.set_inputs(root, &[ret], &[])?;
    target.set_outputs(ret, &[root])?;

    let entry = target.block(0, 1.0, &[start])?;
    let exit = target.block(1, 0.75, &[ret, root])?;
    target.set_successors(entry, &[exit])?;
    target.set_idom(exit, entry, 1)?;
    let cfg = target.cfg(&[entry, exit], Some(exit))?;

    let compile = target.compile(Some(run), 42, -1, Some(root), Some(cfg), Some(ilt))?;
    let method = target.method("com/example/Main", "run", "()V")?;
    let task = target.compile_task(method, 42, 4, -1)?;
    let env = target.ci_env(Some(compile), Some(task))?;
    let thread = target.compiler_thread(Some(env))?;

    Ok(Scenario {
        target,
        thread,
        compile,
        ilt,
    })
}

fn run_to_string(session: &Session, command: DumpCommand, threads: &[Address]) -> String {
    let mut out = Vec::new();
    run(session, command, threads, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn inline_tree_counts_every_node() -> Result<()> {
    let scenario = scenario()?;
    let session = scenario.target.session()?;
    let root = InlineTree::new(scenario.ilt).unwrap();

    assert_eq!(root.count(&session)?, 4);
    assert_eq!(root.caller_bci(&session)?, -1);
    assert_eq!(root.inline_level(&session)?, 0);

    let subtrees = root.subtrees(&session)?;
    assert_eq!(subtrees.len(), 2);
    assert_eq!(subtrees[0].count(&session)?, 2);
    assert_eq!(subtrees[0].caller_bci(&session)?, 3);

    let leaf = &subtrees[1];
    assert!(leaf.subtrees(&session)?.is_empty());
    assert_eq!(leaf.count(&session)?, 1);
    assert_eq!(leaf.caller_bci(&session)?, 9);
    assert_eq!(leaf.inline_level(&session)?, 1);

    let grandchild = &subtrees[0].subtrees(&session)?[0];
    assert_eq!(grandchild.inline_level(&session)?, 2);
    assert_eq!(
        grandchild.caller_tree(&session)?.unwrap().address(),
        subtrees[0].address()
    );
    Ok(())
}

#[test]
fn inline_tree_replay_is_pre_order() -> Result<()> {
    let scenario = scenario()?;
    let session = scenario.target.session()?;
    let root = InlineTree::new(scenario.ilt).unwrap();

    let mut out = Vec::new();
    root.dump_replay_data(&session, &mut out)?;
    assert_eq!(
        String::from_utf8(out).unwrap(),
        " 0 -1 com/example/Main run ()V \
         1 3 com/example/Main <init> ()V \
         2 1 java/lang/Object <init> ()V \
         1 9 java/lang/String hashCode ()I"
    );
    Ok(())
}

#[test]
fn compile_exposes_its_parts() -> Result<()> {
    let scenario = scenario()?;
    let session = scenario.target.session()?;
    let compile = Compile::new(scenario.compile).unwrap();

    assert_eq!(compile.compile_id(&session)?, 42);
    assert_eq!(compile.entry_bci(&session)?, -1);
    assert_eq!(
        compile.method(&session)?.unwrap().short_name(&session)?,
        "com/example/Main::run"
    );

    let root = compile.root(&session)?.unwrap();
    assert_eq!(root.kind(), NodeKind::Root);
    assert!(Arc::ptr_eq(&root, &session.node_at(root.address())?.unwrap()));

    let ilt = compile.ilt(&session)?.unwrap();
    assert_eq!(ilt.address(), scenario.ilt);
    Ok(())
}

#[test]
fn cfg_lists_blocks_and_dominators() -> Result<()> {
    let scenario = scenario()?;
    let session = scenario.target.session()?;
    let cfg = Compile::new(scenario.compile).unwrap().cfg(&session)?.unwrap();

    assert_eq!(cfg.number_of_blocks(&session)?, 2);
    let blocks = cfg.blocks(&session)?;
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].idom(&session)?.unwrap().address(), blocks[0].address());
    assert_eq!(blocks[1].dom_depth(&session)?, 1);
    assert_eq!(blocks[1].freq(&session)?, 0.75);
    assert_eq!(
        cfg.root_block(&session)?.unwrap().address(),
        blocks[1].address()
    );

    let mut out = Vec::new();
    cfg.dump(&session, &mut out)?;
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "--- CFG --- 2 BBs\n\
         B0: #\tfreq: 1\n\
         \tIDom: none\n\
         \tSuccs: B1\n \
         1\tStart\t=== [[ 2 ]]\n\
         \n\
         B1: #\tfreq: 0.75\n\
         \tIDom: B0/#1\n\
         \tSuccs: none\n \
         2\tReturn\t=== 1 [[ 0 ]]\n \
         0\tRoot\t=== 2 [[ ]]\n\
         \n"
    );
    Ok(())
}

#[test]
fn commands_walk_the_compiling_thread() -> Result<()> {
    let scenario = scenario()?;
    let session = scenario.target.session()?;
    let header = format!("CompilerThread {}\n", scenario.thread);

    let ideal = run_to_string(&session, DumpCommand::Ideal, &[scenario.thread]);
    assert_eq!(
        ideal,
        format!(
            "{header} 1\tStart\t=== [[ 2 ]]\n 2\tReturn\t=== 1 [[ 0 ]]\n 0\tRoot\t=== 2 [[ ]]\n"
        )
    );

    let ilt = run_to_string(&session, DumpCommand::InlineTree, &[scenario.thread]);
    assert_eq!(
        ilt,
        format!(
            "{header} @ -1 com/example/Main::run\n   @ 3 com/example/Main::<init>\n     @ 1 java/lang/Object::<init>\n   @ 9 java/lang/String::hashCode\n"
        )
    );

    let replay = run_to_string(&session, DumpCommand::ReplayData, &[scenario.thread]);
    assert!(replay.starts_with(&format!(
        "{header}compile com/example/Main run ()V -1 4 inline 4 0 -1 com/example/Main run ()V"
    )));
    assert!(replay.ends_with(" 1 9 java/lang/String hashCode ()I\n"));
    Ok(())
}

#[test]
fn command_errors_stop_at_the_thread() -> Result<()> {
    let mut scenario = scenario()?;
    let broken_env = scenario.target.ci_env(Some(scenario.compile), None)?;
    let broken = scenario.target.compiler_thread(Some(broken_env))?;
    let session = scenario.target.session()?;

    let text = run_to_string(
        &session,
        DumpCommand::ReplayData,
        &[broken, scenario.thread],
    );
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], format!("CompilerThread {broken}"));
    assert!(lines[1].starts_with("  error: "));
    assert_eq!(lines[2], format!("CompilerThread {}", scenario.thread));
    assert!(lines[3].starts_with("compile com/example/Main run ()V -1 4 "));
    Ok(())
}

#[test]
fn command_errors_cover_layout_mismatches() -> Result<()> {
    let layout = LayoutDatabase::builder()
        .add_type("Node", None, 0x40)
        .build()?;
    let session = Session::attach(Target::new(Arc::new(MemoryImage::new(8)), Arc::new(layout)));

    let text = run_to_string(&session, DumpCommand::Cfg, &[Address::new(0x1000)]);
    assert_eq!(
        text,
        "  error: Type 'CompilerThread' is not present in the target type database\n"
    );
    Ok(())
}
