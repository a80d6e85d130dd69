use stepflow::testing::{CountingSource, PassThrough};
use stepflow::{MergeFn, Merger, Producer, Step, StepError, Transformer};

#[derive(Clone, Debug, PartialEq)]
struct Nums(Vec<i64>);

impl stepflow::Payload for Nums {
    type Meta = String;

    fn absent() -> Self {
        Nums(Vec::new())
    }
}

fn concat() -> MergeFn<impl Fn(&(), Vec<Nums>, stepflow::EvalMode) -> anyhow::Result<Nums>> {
    MergeFn(|_: &(), inputs: Vec<Nums>, _| -> anyhow::Result<Nums> {
        let mut all = Vec::new();
        for Nums(v) in inputs {
            all.extend(v);
        }
        Ok(Nums(all))
    })
}

#[test]
fn metadata_flows_without_evaluating() {
    let source = Producer::with_metadata(CountingSource::of(Nums(vec![1])), "ints".to_string());
    let a = Transformer::<Nums, (), _>::new(PassThrough);
    let b = Transformer::new(PassThrough);
    source.out().connect_to(a.in_port(0));
    a.out().connect_to(b.in_port(0));

    // Two hops of inheritance, zero pulls.
    assert_eq!(b.out_metadata(), Some("ints".to_string()));
    assert_eq!(source.op().pulls(), 0);
}

#[test]
fn declared_metadata_overrides_inherited() {
    let source = Producer::with_metadata(CountingSource::of(Nums(vec![1])), "ints".to_string());
    let relabeled = Transformer::<Nums, (), _>::with_metadata(PassThrough, "relabeled".to_string());
    source.out().connect_to(relabeled.in_port(0));

    assert_eq!(relabeled.out_metadata(), Some("relabeled".to_string()));
}

#[test]
fn splitter_metadata_inherits_or_overrides() {
    let passthrough = stepflow::SplitFn(
        |_: &(), input: Nums, _, _| -> anyhow::Result<Nums> { Ok(input) },
    );

    let source = Producer::with_metadata(CountingSource::of(Nums(vec![1])), "ints".to_string());
    let inheriting = stepflow::Splitter::new(passthrough, 2);
    source.out().connect_to(inheriting.in_port(0));
    assert_eq!(inheriting.out_metadata(), Some("ints".to_string()));

    let passthrough = stepflow::SplitFn(
        |_: &(), input: Nums, _, _| -> anyhow::Result<Nums> { Ok(input) },
    );
    let relabeled = stepflow::Splitter::with_metadata(passthrough, 2, "relabeled".to_string());
    source.out().connect_to(relabeled.in_port(0));
    assert_eq!(relabeled.out_metadata(), Some("relabeled".to_string()));
}

#[test]
fn merged_metadata_agrees() -> anyhow::Result<()> {
    let left = Producer::with_metadata(CountingSource::of(Nums(vec![1])), "ints".to_string());
    let right = Producer::with_metadata(CountingSource::of(Nums(vec![2])), "ints".to_string());
    let merger = Merger::new(concat(), 2);
    left.out().connect_to(merger.in_port(0));
    right.out().connect_to(merger.in_port(1));

    assert_eq!(merger.out_metadata(), Some("ints".to_string()));
    assert_eq!(merger.output(&())?, Nums(vec![1, 2]));
    Ok(())
}

#[test]
fn merged_metadata_mismatch_fails_the_pull() {
    let left = Producer::with_metadata(CountingSource::of(Nums(vec![1])), "ints".to_string());
    let right = Producer::with_metadata(CountingSource::of(Nums(vec![2])), "floats".to_string());
    let merger = Merger::new(concat(), 2);
    left.out().connect_to(merger.in_port(0));
    right.out().connect_to(merger.in_port(1));

    // Reading metadata stays quiet; evaluating does not.
    assert_eq!(merger.out_metadata(), None);
    let err = merger.output(&()).unwrap_err();
    assert!(matches!(err, StepError::MetadataMismatch { .. }));

    // The check happens before any input is evaluated.
    assert_eq!(left.op().pulls(), 0);
    assert_eq!(right.op().pulls(), 0);
}

#[test]
fn any_absent_metadata_means_undefined_not_error() -> anyhow::Result<()> {
    let labeled = Producer::with_metadata(CountingSource::of(Nums(vec![1])), "ints".to_string());
    let unlabeled = Producer::new(CountingSource::of(Nums(vec![2])));
    let merger = Merger::new(concat(), 2);
    labeled.out().connect_to(merger.in_port(0));
    unlabeled.out().connect_to(merger.in_port(1));

    assert_eq!(merger.out_metadata(), None);
    assert_eq!(merger.output(&())?, Nums(vec![1, 2]));
    Ok(())
}
