#![forbid(unsafe_code)]

//! The facade exposes a complete loop through the prelude alone.

use sandloop::prelude::*;
use sandloop_harness::{ManualContext, RecordingView};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Msg {
    Add(i64),
    Lookup(u32),
    Found(i64),
    Missing,
}

#[derive(Debug)]
enum Cmd {
    Lookup(u32),
}

fn update(msg: Msg, total: &i64) -> Return<i64, Cmd> {
    match msg {
        Msg::Add(n) => Return::Pure(total + n),
        Msg::Lookup(key) => Return::Effect(*total, Cmd::Lookup(key)),
        Msg::Found(n) => Return::Pure(total + n),
        Msg::Missing => Return::Pure(-1),
    }
}

#[test]
fn prelude_runs_a_loop_with_commands() {
    let view = RecordingView::new();
    let sandbox = Sandbox::create(
        Return::Pure(0),
        update,
        view.callback(),
        dispatch(
            |cmd: &Cmd| match cmd {
                Cmd::Lookup(0) => stream::fail::<Msg, String>("no key 0".into()),
                Cmd::Lookup(key) => stream::just(Msg::Found(i64::from(*key) * 10)),
            },
            |_cmd: Cmd, _err: String| Msg::Missing,
        ),
    );
    sandbox.accept(Msg::Add(1));
    sandbox.accept(Msg::Lookup(4));
    sandbox.accept(Msg::Lookup(0));
    assert_eq!(view.snapshot(), vec![0, 1, 1, 41, 41, -1]);
    assert_eq!(sandbox.stats().commands_recovered, 1);
}

#[test]
fn config_selects_contexts_and_name() {
    let view = RecordingView::new();
    let update_ctx = ManualContext::new();
    let sandbox = Sandbox::pure(0i64, |n: i64, total: &i64| total + n, view.callback())
        .config(SandboxConfig::named("facade"))
        .update_context(update_ctx.clone())
        .start()
        .expect("valid config");
    sandbox.accept(5);
    assert_eq!(view.snapshot(), vec![0]);
    update_ctx.run_until_idle();
    assert_eq!(view.snapshot(), vec![0, 5]);
    assert_eq!(sandbox.name(), "facade");
}

#[test]
fn error_alias_matches_runtime() {
    let err: sandloop::Result<Sandbox<i64>> =
        Sandbox::pure(0i64, |n: i64, t: &i64| t + n, |_: &i64| {})
            .name("")
            .start();
    assert!(matches!(err, Err(sandloop::Error::Config(_))));
}
