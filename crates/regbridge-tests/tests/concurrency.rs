//! Concurrent sessions sharing one temp root.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p regbridge-tests --test concurrency
//! ```

#![cfg(unix)]

use std::collections::HashSet;
use std::thread;

use regbridge::{
    ImageRef, InvokerConfig, RegistrationOptions, RegistrationSession, TempSpace, UuidNames,
};
use regbridge_tests::fixtures::{gray_gradient, test_card};
use regbridge_tests::{FakeTool, TestWorkspace};

const SESSIONS: usize = 8;

#[test]
fn test_parallel_sessions_do_not_collide() {
    let ws = TestWorkspace::new();
    let tool = ws.install_tool(&FakeTool::new());
    let params = ws.write_params();
    let temp_root = ws.temp_root();
    let (tool, params, temp_root) = (&tool, &params, &temp_root);

    let outputs = thread::scope(|scope| {
        let handles: Vec<_> = (0..SESSIONS)
            .map(|_| {
                scope.spawn(move || {
                    RegistrationSession::new()
                        .with_invoker_config(InvokerConfig::default().tool_path(tool))
                        .with_temp_space(TempSpace::new(temp_root).with_names(UuidNames))
                        .run(
                            params,
                            &ImageRef::Pixels(gray_gradient()),
                            &ImageRef::Pixels(test_card()),
                            &RegistrationOptions::default(),
                        )
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("session thread panicked"))
            .collect::<Vec<_>>()
    });

    for output in outputs {
        let output = output.expect("registration should succeed");
        assert_eq!(
            output.image.as_ref().and_then(ImageRef::as_pixels),
            Some(&test_card())
        );
    }

    let calls = ws.invocations();
    assert_eq!(calls.len(), SESSIONS);
    let out_dirs: HashSet<_> = calls.iter().map(|c| c.out_dir.clone()).collect();
    let inputs: HashSet<_> = calls
        .iter()
        .flat_map(|c| [c.fixed.clone(), c.moving.clone()])
        .collect();
    assert_eq!(out_dirs.len(), SESSIONS);
    assert_eq!(inputs.len(), SESSIONS * 2);

    ws.assert_no_temp_resources();
}
