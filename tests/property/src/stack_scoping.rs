use combo_kernel::{Argument, Batch, BatchStep, KernelConfig, KernelError, Payload, StackValue};
use proptest::prelude::*;

#[path = "common/mod.rs"]
mod common;
use common::*;

fn depth() -> BatchStep {
    BatchStep::new(script_id(), Payload::new("depth"))
}

fn read(argument: Argument) -> BatchStep {
    BatchStep::new(script_id(), Payload::new("read").arg(argument))
}

/// Property: every batch starts with an empty cache, whatever ran before
#[test]
fn prop_cache_never_leaks_between_batches() {
    proptest!(|(batches in prop::collection::vec(
        (prop::collection::vec(0u128..1_000, 0..16), any::<bool>()),
        1..6
    ))| {
        let mut h = Harness::new(KernelConfig::default());
        for (pushes, fail) in batches {
            let mut steps = vec![depth()];
            steps.extend(pushes.iter().map(|amount| to_step(&Op::Push(*amount))));
            if fail {
                steps.push(to_step(&Op::Fail));
            }

            let result = h.proxy.execute(&mut h.ledger, &Batch::new(steps));
            prop_assert_eq!(result.is_success(), !fail);
            if !fail {
                prop_assert_eq!(&result.outputs[0].values, &vec![StackValue::Amount(0)]);
            }
        }
    });
}

/// Property: a peek reads the frame `offset` below the top without consuming it
#[test]
fn prop_peek_reads_from_the_top() {
    proptest!(|(
        pushes in prop::collection::vec(0u128..1_000_000, 1..32),
        offset in any::<prop::sample::Index>(),
    )| {
        let mut h = Harness::new(KernelConfig::default());
        let offset = offset.index(pushes.len());

        let mut steps: Vec<BatchStep> = pushes.iter().map(|amount| to_step(&Op::Push(*amount))).collect();
        steps.push(read(Argument::peek(offset as u16)));
        steps.push(depth());

        let result = h.proxy.execute(&mut h.ledger, &Batch::new(steps));
        prop_assert!(result.is_success(), "batch failed: {:?}", result.failure);

        let outputs = &result.outputs;
        let expected = pushes[pushes.len() - 1 - offset];
        prop_assert_eq!(&outputs[pushes.len()].values, &vec![StackValue::Amount(expected)]);
        // pushes, plus the value `read` pushed back
        prop_assert_eq!(
            &outputs[pushes.len() + 1].values,
            &vec![StackValue::Amount(pushes.len() as u128 + 1)]
        );
    });
}

/// Property: references past the frames pushed so far underflow the batch
#[test]
fn prop_reference_beyond_pushed_frames_underflows() {
    proptest!(|(pushed in 0usize..16, beyond in 0usize..16)| {
        let mut h = Harness::new(KernelConfig::default());
        let offset = pushed + beyond;

        let mut steps: Vec<BatchStep> = (0..pushed).map(|n| to_step(&Op::Push(n as u128))).collect();
        steps.push(read(Argument::peek(offset as u16)));
        let before = h.ledger.snapshot();

        let result = h.proxy.execute(&mut h.ledger, &Batch::new(steps));
        let failure = result.failure.unwrap();
        prop_assert_eq!(failure.step, Some(pushed));
        prop_assert_eq!(failure.error, KernelError::StackUnderflow { offset, depth: pushed });
        prop_assert_eq!(h.ledger.snapshot(), before);
    });
}

/// Property: the cache refuses to grow past its configured depth
#[test]
fn prop_overflow_at_configured_depth() {
    proptest!(|(max_depth in 1usize..16, extra in 1usize..8)| {
        let config = KernelConfig {
            max_stack_depth: max_depth,
            ..KernelConfig::default()
        };
        let mut h = Harness::new(config);
        let steps: Vec<BatchStep> = (0..max_depth + extra)
            .map(|n| to_step(&Op::Push(n as u128)))
            .collect();

        let result = h.proxy.execute(&mut h.ledger, &Batch::new(steps));
        let failure = result.failure.unwrap();
        prop_assert_eq!(failure.step, Some(max_depth));
        prop_assert_eq!(failure.error, KernelError::StackOverflow { max_depth });
    });
}
