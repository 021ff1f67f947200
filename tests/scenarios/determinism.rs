//! Test: generated documents are deterministic and mirror the stage tree

use crate::helpers::*;
use pipeline_syntax::compiler::graph::ORDERING_RESOURCE;
use pipeline_syntax::compiler::{generate, mangle_to_rfc1035_label, StageNode};
use pipeline_syntax::core::{
    Agent, EnvVar, Pipeline, RootOptions, Stage, StageBody, StageOptions, Step, StepAction,
};
use proptest::prelude::*;

/// Shape of a stage tree, without names or step contents
#[derive(Debug, Clone, PartialEq)]
enum Shape {
    Leaf(usize),
    Sequence(Vec<Shape>),
    Parallel(Vec<Shape>),
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    let leaf = (1usize..4).prop_map(Shape::Leaf);
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Shape::Sequence),
            prop::collection::vec(inner, 1..4).prop_map(Shape::Parallel),
        ]
    })
}

fn build_stage(shape: &Shape, counter: &mut usize) -> Stage {
    *counter += 1;
    let name = format!("Stage {}", counter);

    let body = match shape {
        Shape::Leaf(steps) => StageBody::Steps(
            (0..*steps)
                .map(|i| {
                    Step::new(StepAction::Command {
                        command: "echo".to_string(),
                        args: vec![i.to_string()],
                    })
                })
                .collect(),
        ),
        Shape::Sequence(children) => {
            StageBody::Stages(children.iter().map(|c| build_stage(c, counter)).collect())
        }
        Shape::Parallel(children) => {
            StageBody::Parallel(children.iter().map(|c| build_stage(c, counter)).collect())
        }
    };

    Stage {
        name,
        agent: None,
        options: StageOptions::default(),
        environment: vec![EnvVar::new("DEPTH", counter.to_string())],
        post: vec![],
        body,
    }
}

fn build_pipeline(shapes: &[Shape]) -> Pipeline {
    let mut counter = 0;
    Pipeline {
        agent: Some(Agent::Image("some-image".to_string())),
        options: RootOptions::default(),
        environment: vec![],
        post: vec![],
        stages: shapes.iter().map(|s| build_stage(s, &mut counter)).collect(),
    }
}

fn shape_of_stage(stage: &Stage) -> Shape {
    match &stage.body {
        StageBody::Steps(steps) => Shape::Leaf(steps.len()),
        StageBody::Stages(children) => Shape::Sequence(children.iter().map(shape_of_stage).collect()),
        StageBody::Parallel(children) => Shape::Parallel(children.iter().map(shape_of_stage).collect()),
    }
}

/// Leaf step counts are not recorded in the structure; compare with 0
fn shape_of_node(node: &StageNode) -> Shape {
    if node.is_leaf() {
        Shape::Leaf(0)
    } else if node.parallel {
        Shape::Parallel(node.children.iter().map(shape_of_node).collect())
    } else {
        Shape::Sequence(node.children.iter().map(shape_of_node).collect())
    }
}

fn erase_steps(shape: &Shape) -> Shape {
    match shape {
        Shape::Leaf(_) => Shape::Leaf(0),
        Shape::Sequence(children) => Shape::Sequence(children.iter().map(erase_steps).collect()),
        Shape::Parallel(children) => Shape::Parallel(children.iter().map(erase_steps).collect()),
    }
}

#[test]
fn test_recompilation_is_byte_identical() {
    let yaml = r#"
agent:
  image: some-image
environment:
  - name: B
    value: b
  - name: A
    value: a
stages:
  - name: first
    steps:
      - loop:
          variable: V
          values: [x, y]
          steps:
            - command: echo
  - name: group
    parallel:
      - name: left
        steps:
          - command: ls
      - name: right
        steps:
          - command: ls
"#;

    let a = compile_yaml(yaml);
    let b = compile_yaml(yaml);
    assert_eq!(a, b);
    assert_eq!(
        serde_yaml::to_string(&a).unwrap(),
        serde_yaml::to_string(&b).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_suffix_applies_to_every_task() {
    let generated = compile_yaml_with(
        r#"
agent:
  image: some-image
stages:
  - name: first
    steps:
      - command: ls
  - name: second
    steps:
      - command: ls
"#,
        &options().with_suffix("abc"),
    );

    let names: Vec<&str> = generated.graph.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["first-abc-1", "second-abc-2"]);
    assert_eq!(generated.tasks[1].name, "repo-second-abc-2");
}

#[test]
fn test_long_suffix_keeps_task_names_unique() {
    let generated = compile_yaml_with(
        r#"
agent:
  image: some-image
stages:
  - name: first
    steps:
      - command: ls
  - name: second
    steps:
      - command: ls
"#,
        &options().with_suffix("b".repeat(62)),
    );

    let names: Vec<&str> = generated.graph.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
    assert!(names[0].ends_with("-1"));
    assert!(names[1].ends_with("-2"));
    assert!(names.iter().all(|n| n.len() <= 63));

    assert_eq!(input_from(graph_task(&generated, names[1]), ORDERING_RESOURCE), vec![names[0]]);
    assert_eq!(generated.graph.execution_order().unwrap(), names);

    let definitions: Vec<&str> = generated.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_ne!(definitions[0], definitions[1]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_one_task_per_leaf(shapes in prop::collection::vec(shape_strategy(), 1..4)) {
        let pipeline = build_pipeline(&shapes);
        let generated = generate(&pipeline, &options()).unwrap();

        prop_assert_eq!(generated.graph.tasks.len(), pipeline.leaf_count());
        prop_assert_eq!(generated.tasks.len(), pipeline.leaf_count());
        prop_assert_eq!(generated.structure.stages.len(), pipeline.stage_names().len());
    }

    #[test]
    fn prop_generation_is_idempotent(shapes in prop::collection::vec(shape_strategy(), 1..4)) {
        let pipeline = build_pipeline(&shapes);
        let first = generate(&pipeline, &options()).unwrap();
        let second = generate(&pipeline, &options()).unwrap();

        prop_assert_eq!(
            serde_yaml::to_string(&first).unwrap(),
            serde_yaml::to_string(&second).unwrap()
        );
    }

    #[test]
    fn prop_structure_round_trips(shapes in prop::collection::vec(shape_strategy(), 1..4)) {
        let pipeline = build_pipeline(&shapes);
        let generated = generate(&pipeline, &options()).unwrap();
        let tree = generated.structure.to_tree().unwrap();

        let expected: Vec<Shape> = pipeline.stages.iter().map(|s| erase_steps(&shape_of_stage(s))).collect();
        let rebuilt: Vec<Shape> = tree.iter().map(shape_of_node).collect();
        prop_assert_eq!(rebuilt, expected);

        let names: Vec<String> = tree.iter().map(|n| n.name.clone()).collect();
        let top: Vec<String> = pipeline.stages.iter().map(|s| s.name.clone()).collect();
        prop_assert_eq!(names, top);
    }

    #[test]
    fn prop_graph_is_ordered_and_named(shapes in prop::collection::vec(shape_strategy(), 1..4)) {
        let pipeline = build_pipeline(&shapes);
        let generated = generate(&pipeline, &options()).unwrap();

        let order = generated.graph.execution_order().unwrap();
        prop_assert_eq!(order.len(), generated.graph.tasks.len());
        for (from, to) in generated.graph.edges() {
            let from_pos = order.iter().position(|n| *n == from).unwrap();
            let to_pos = order.iter().position(|n| *n == to).unwrap();
            prop_assert!(from_pos < to_pos);
        }

        for task in &generated.graph.tasks {
            prop_assert_eq!(mangle_to_rfc1035_label(&task.name, ""), task.name.clone());
        }

        // only the first task mounts the workspace
        let mounted = generated
            .tasks
            .iter()
            .filter(|t| t.inputs.iter().any(|i| i.target_path.is_some()))
            .count();
        prop_assert_eq!(mounted, 1);
    }
}
