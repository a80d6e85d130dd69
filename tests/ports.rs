use std::rc::Rc;

use stepflow::testing::{CountingSource, PassThrough};
use stepflow::{Producer, SplitFn, Splitter, Step, Transformer, bind_each};

#[derive(Clone, Debug, PartialEq)]
struct Nums(Vec<i64>);

impl stepflow::Payload for Nums {
    type Meta = String;

    fn absent() -> Self {
        Nums(Vec::new())
    }
}

#[test]
fn in_port_identity_is_stable() {
    let step: Rc<Transformer<Nums, (), PassThrough>> = Transformer::new(PassThrough);
    assert!(std::ptr::eq(step.in_port(0), step.in_port(0)));
}

#[test]
fn out_port_handles_compare_equal() {
    let step = Producer::<Nums, (), _>::new(CountingSource::of(Nums(vec![1])));
    assert_eq!(step.out(), step.out());

    let other = Producer::new(CountingSource::of(Nums(vec![1])));
    assert_ne!(step.out(), other.out());
}

#[test]
fn unconnected_is_an_explicit_state() {
    let step: Rc<Transformer<Nums, (), PassThrough>> = Transformer::new(PassThrough);
    assert!(!step.in_port(0).is_connected());
    assert!(step.in_port(0).source().is_none());
}

#[test]
fn rebinding_replaces_the_previous_edge() -> anyhow::Result<()> {
    let first = Producer::new(CountingSource::of(Nums(vec![1])));
    let second = Producer::new(CountingSource::of(Nums(vec![2])));
    let sink = Transformer::new(PassThrough);

    first.out().connect_to(sink.in_port(0));
    second.out().connect_to(sink.in_port(0));

    // Last bind wins, silently.
    assert_eq!(sink.output(&())?, Nums(vec![2]));
    assert_eq!(sink.in_port(0).source(), Some(second.out()));
    assert_eq!(first.op().pulls(), 0);
    Ok(())
}

#[test]
fn connect_to_step_binds_the_default_input() -> anyhow::Result<()> {
    let source = Producer::new(CountingSource::of(Nums(vec![5])));
    let sink = Transformer::new(PassThrough);
    source.out().connect_to_step(sink.as_ref());
    assert_eq!(sink.output(&())?, Nums(vec![5]));
    Ok(())
}

#[test]
fn wiring_keeps_upstream_alive() -> anyhow::Result<()> {
    let sink = Transformer::new(PassThrough);
    {
        let source = Producer::new(CountingSource::of(Nums(vec![9])));
        source.out().connect_to(sink.in_port(0));
        // `source` goes out of scope here; the edge holds the step.
    }
    assert_eq!(sink.output(&())?, Nums(vec![9]));
    Ok(())
}

#[test]
fn bind_each_wires_positionally() -> anyhow::Result<()> {
    let source = Producer::new(CountingSource::of(Nums(vec![1, 2, 3, 4])));
    let splitter = Splitter::new(
        SplitFn(
            |_: &(), Nums(v): Nums, out_index: usize, _| -> anyhow::Result<Nums> {
                Ok(Nums(
                    v.into_iter()
                        .filter(|n| (*n % 2 == 0) == (out_index == 0))
                        .collect(),
                ))
            },
        ),
        2,
    );
    source.out().connect_to(splitter.in_port(0));

    let evens = Transformer::new(PassThrough);
    let odds = Transformer::new(PassThrough);
    bind_each(
        [splitter.out(0), splitter.out(1)],
        [evens.in_port(0), odds.in_port(0)],
    );

    assert_eq!(evens.output(&())?, Nums(vec![2, 4]));
    assert_eq!(odds.output(&())?, Nums(vec![1, 3]));
    Ok(())
}

#[test]
#[should_panic(expected = "mismatched source and target counts")]
fn bind_each_flags_mismatched_counts() {
    let source = Producer::new(CountingSource::of(Nums(vec![1])));
    let sink = Transformer::<Nums, (), _>::new(PassThrough);
    bind_each([source.out(), source.out()], [sink.in_port(0)]);
}
