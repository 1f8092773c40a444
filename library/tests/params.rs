//! Parameters of live instances: keyframes and command line arguments.

mod common;

use common::test_host;
use fxhost::graph::{Graph, NodeId};
use fxhost::param::{ParamError, ParamValue};
use fxhost::HostError;

fn blur(graph: &mut Graph) -> NodeId {
    graph.create_node("blur").unwrap()
}

#[test]
fn test_declared_defaults() {
    let mut graph = Graph::new(test_host());
    let id = blur(&mut graph);
    let node = graph.node(id).unwrap();
    assert_eq!(node.param_names(), vec!["radius", "size", "mode", "label"]);
    assert_eq!(node.param("radius").unwrap(), ParamValue::scalar(1.0));
    assert_eq!(node.param("size").unwrap(), ParamValue::Numbers(vec![1.0, 1.0]));
    assert_eq!(node.param("mode").unwrap(), ParamValue::scalar(0.0));
    assert_eq!(node.param("label").unwrap(), ParamValue::Text(String::new()));
    assert!(matches!(
        node.param("missing"),
        Err(HostError::Param(ParamError::UnknownParam(_)))
    ));
}

#[test]
fn test_keyframes_interpolate_and_hold() {
    let mut graph = Graph::new(test_host());
    let id = blur(&mut graph);
    let node = graph.node(id).unwrap();
    node.set_param_at_time("radius", 0.0, 0.0).unwrap();
    node.set_param_at_time("radius", 10.0, 100.0).unwrap();

    let at = |t: f64| node.param_at_time("radius", t).unwrap().as_f64().unwrap();
    assert!((at(5.0) - 50.0).abs() < 1e-9);
    assert_eq!(at(-1.0), 0.0);
    assert_eq!(at(11.0), 100.0);
    assert_eq!(node.with_param("radius", |p| p.keyframes().len()).unwrap(), 2);

    // A static set drops the animation.
    node.set_param("radius", 7.0).unwrap();
    assert_eq!(at(5.0), 7.0);
    assert!(!node.with_param("radius", |p| p.is_animated()).unwrap());
}

#[test]
fn test_values_are_clamped_to_the_declared_range() {
    let mut graph = Graph::new(test_host());
    let id = blur(&mut graph);
    let node = graph.node(id).unwrap();
    node.set_param("radius", 150.0).unwrap();
    assert_eq!(node.param("radius").unwrap().as_f64(), Some(100.0));
    node.set_param_expression("radius", "-3").unwrap();
    assert_eq!(node.param("radius").unwrap().as_f64(), Some(0.0));
}

#[test]
fn test_string_and_choice_params_are_not_animatable() {
    let mut graph = Graph::new(test_host());
    let id = blur(&mut graph);
    let node = graph.node(id).unwrap();
    assert!(matches!(
        node.set_param_at_time("label", 1.0, "x"),
        Err(HostError::Param(ParamError::NotAnimatable(_)))
    ));
    assert!(matches!(
        node.set_param("mode", 5),
        Err(HostError::Param(ParamError::WrongValue { .. }))
    ));
}

#[test]
fn test_arguments_by_position_and_keyword() {
    let mut graph = Graph::new(test_host());
    let id = blur(&mut graph);
    graph
        .apply_arguments(id, &["2.5", "3", "mode=gaussian", "label='hello world'"])
        .unwrap();
    let node = graph.node(id).unwrap();
    assert_eq!(node.param("radius").unwrap().as_f64(), Some(2.5));
    assert_eq!(node.param("size").unwrap(), ParamValue::Numbers(vec![3.0, 3.0]));
    assert_eq!(node.param("mode").unwrap().as_i32(), Some(1));
    assert_eq!(node.param("label").unwrap().as_str(), Some("hello world"));

    graph.apply_arguments(id, &["size=[1]=8"]).unwrap();
    assert_eq!(
        graph.node(id).unwrap().param("size").unwrap(),
        ParamValue::Numbers(vec![3.0, 8.0])
    );
}

#[test]
fn test_bad_arguments_change_nothing() {
    let mut graph = Graph::new(test_host());
    let id = blur(&mut graph);

    let err = graph.apply_arguments(id, &["4", "radius=abc"]).unwrap_err();
    match err {
        HostError::ParameterParse { param, text, .. } => {
            assert_eq!(param, "radius");
            assert_eq!(text, "abc");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(graph.node(id).unwrap().param("radius").unwrap().as_f64(), Some(1.0));

    assert!(matches!(
        graph.apply_arguments(id, &["mode=median"]),
        Err(HostError::ParameterParse { .. })
    ));
    assert!(matches!(
        graph.apply_arguments(id, &["nope=1"]),
        Err(HostError::Param(ParamError::UnknownParam(_)))
    ));
    assert!(matches!(
        graph.apply_arguments(id, &["1", "2", "0", "x", "extra"]),
        Err(HostError::ParameterParse { .. })
    ));
    assert!(matches!(
        graph.apply_arguments(id, &["radius=2", "3"]),
        Err(HostError::ParameterParse { .. })
    ));
}

#[test]
fn test_failed_write_rolls_back_earlier_arguments() {
    let mut graph = Graph::new(test_host());
    let id = blur(&mut graph);
    graph.node(id).unwrap().set_param_at_time("size", 0.0, vec![2.0, 2.0]).unwrap();

    // The component write parses but cannot apply to a keyed parameter.
    let err = graph
        .apply_arguments(id, &["radius=5", "label=kept", "size=[1]=8"])
        .unwrap_err();
    assert!(matches!(err, HostError::Param(ParamError::Animated(ref name)) if name == "size"));

    let node = graph.node(id).unwrap();
    assert_eq!(node.param("radius").unwrap().as_f64(), Some(1.0));
    assert_eq!(node.param("label").unwrap().as_str(), Some(""));
    assert_eq!(node.with_param("size", |p| p.keyframes().len()).unwrap(), 1);
}
