//! Test: environment inheritance and loop expansion

use crate::helpers::*;

#[test]
fn test_environment_cascades_into_steps() {
    let generated = compile_yaml(
        r#"
agent:
  image: some-image
environment:
  - name: SOME_VAR
    value: A value
  - name: OVERRIDDEN
    value: pipeline
stages:
  - name: Outer
    environment:
      - name: OVERRIDDEN
        value: outer
    stages:
      - name: Inner
        environment:
          - name: INNER_VAR
            value: inner
        steps:
          - command: env
"#,
    );

    let task = task_definition(&generated, "repo-inner-1");
    assert_eq!(
        env_pairs(task, 0),
        vec!["INNER_VAR=inner", "OVERRIDDEN=outer", "SOME_VAR=A value"]
    );
}

#[test]
fn test_sibling_environment_is_not_shared() {
    let generated = compile_yaml(
        r#"
agent:
  image: some-image
stages:
  - name: first
    environment:
      - name: ONLY_FIRST
        value: "1"
    steps:
      - command: env
  - name: second
    steps:
      - command: env
"#,
    );

    assert_eq!(env_pairs(task_definition(&generated, "repo-first-1"), 0), vec!["ONLY_FIRST=1"]);
    assert!(task_definition(&generated, "repo-second-2").steps[0].env.is_empty());
}

#[test]
fn test_loop_expands_in_value_order() {
    let generated = compile_yaml(
        r#"
agent:
  image: some-image
environment:
  - name: FROM_PIPELINE
    value: "yes"
stages:
  - name: loops
    steps:
      - loop:
          variable: LANGUAGE
          values: [maven, gradle, nodejs]
          steps:
            - command: echo
              args: ["${LANGUAGE}"]
"#,
    );

    let task = task_definition(&generated, "repo-loops-1");
    assert_eq!(task.steps.len(), 3);

    for (i, language) in ["maven", "gradle", "nodejs"].iter().enumerate() {
        assert_eq!(task.steps[i].name, format!("step{}", i + 1));
        assert_eq!(
            env_pairs(task, i),
            vec!["FROM_PIPELINE=yes".to_string(), format!("LANGUAGE={}", language)]
        );
    }
}

#[test]
fn test_nested_loops_are_value_major() {
    let generated = compile_yaml(
        r#"
agent:
  image: some-image
stages:
  - name: matrix
    steps:
      - loop:
          variable: LANGUAGE
          values: [maven, gradle]
          steps:
            - command: echo
              args: ["language"]
            - loop:
                variable: DISTRO
                values: [fedora, ubuntu]
                steps:
                  - command: echo
                    args: ["distro"]
      - command: echo
        args: ["done"]
"#,
    );

    let task = task_definition(&generated, "repo-matrix-1");
    let rendered: Vec<String> = (0..task.steps.len())
        .map(|i| format!("{} {}", task.steps[i].args.join(" "), env_pairs(task, i).join(",")))
        .collect();

    assert_eq!(
        rendered,
        vec![
            "language LANGUAGE=maven",
            "distro DISTRO=fedora,LANGUAGE=maven",
            "distro DISTRO=ubuntu,LANGUAGE=maven",
            "language LANGUAGE=gradle",
            "distro DISTRO=fedora,LANGUAGE=gradle",
            "distro DISTRO=ubuntu,LANGUAGE=gradle",
            "done ",
        ]
    );
    assert_eq!(task.steps.last().unwrap().name, "step7");
}

#[test]
fn test_inner_loop_variable_shadows_outer() {
    let generated = compile_yaml(
        r#"
agent:
  image: some-image
stages:
  - name: shadow
    environment:
      - name: X
        value: stage
    steps:
      - loop:
          variable: X
          values: [outer]
          steps:
            - loop:
                variable: X
                values: [inner]
                steps:
                  - command: echo
"#,
    );

    let task = task_definition(&generated, "repo-shadow-1");
    assert_eq!(env_pairs(task, 0), vec!["X=inner"]);
}

#[test]
fn test_step_dir() {
    let generated = compile_yaml(
        r#"
agent:
  image: some-image
stages:
  - name: dirs
    steps:
      - command: ls
        dir: relative/path
      - command: ls
        dir: /absolute/path
      - dir: looped
        loop:
          variable: V
          values: [a]
          steps:
            - command: ls
            - command: ls
              dir: /override
"#,
    );

    let dirs: Vec<&str> = task_definition(&generated, "repo-dirs-1")
        .steps
        .iter()
        .map(|s| s.working_dir.as_str())
        .collect();
    assert_eq!(
        dirs,
        vec![
            "/workspace/workspace/relative/path",
            "/absolute/path",
            "/workspace/workspace/looped",
            "/override",
        ]
    );
}
