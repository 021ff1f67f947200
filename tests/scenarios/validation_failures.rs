//! Test: located validation errors

use crate::helpers::*;
use pipeline_syntax::validation::PathSegment;

/// (document, message, rendered paths)
const CASES: &[(&str, &str, &[&str])] = &[
    (
        r#"
agent:
  image: some-image
stages: []
"#,
        "missing field(s)",
        &["stages"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: neither
"#,
        "expected exactly one, got neither",
        &["stages[0].steps", "stages[0].stages", "stages[0].parallel"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: both
    steps:
      - command: ls
    parallel:
      - name: child
        steps:
          - command: ls
"#,
        "expected exactly one, got both",
        &["stages[0].steps", "stages[0].stages", "stages[0].parallel"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: "1234"
    steps:
      - command: ls
"#,
        "Stage name must contain at least one ASCII letter",
        &["stages[0].name"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    steps:
      - step: some-step
        args: [nope]
"#,
        "Cannot set command-line arguments for a step or a loop",
        &["stages[0].steps[0].args"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    steps:
      - command: ls
        step: some-step
"#,
        "expected exactly one, got both",
        &[
            "stages[0].steps[0].command",
            "stages[0].steps[0].step",
            "stages[0].steps[0].loop",
        ],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    steps:
      - loop: {}
"#,
        "expected exactly one, got neither",
        &[
            "stages[0].steps[0].command",
            "stages[0].steps[0].step",
            "stages[0].steps[0].loop",
        ],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    steps:
      - loop:
          values: [a]
          steps:
            - command: ls
"#,
        "missing field(s)",
        &["stages[0].steps[0].loop.variable"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    steps:
      - loop:
          variable: V
          values: [a]
          options:
            nope: nope
"#,
        "",
        &[],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    steps:
      - loop:
          variable: V
          values: [a]
        options:
          nope: nope
"#,
        "Cannot set options for a command or a loop",
        &["stages[0].steps[0].options"],
    ),
    (
        r#"
agent:
  image: some-image
options:
  timeout:
    time: 0
stages:
  - name: only
    steps:
      - command: ls
"#,
        "Timeout must be greater than zero",
        &["options.timeout.time"],
    ),
    (
        r#"
agent:
  image: some-image
options:
  timeout:
    time: 5
    unit: years
stages:
  - name: only
    steps:
      - command: ls
"#,
        "years is not a valid time unit. Valid time units are seconds, minutes, hours, days",
        &["options.timeout.unit"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    options:
      retry: -1
    steps:
      - command: ls
"#,
        "Retry count cannot be negative",
        &["stages[0].options.retry"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    options:
      stash:
        files: "**/*"
    steps:
      - command: ls
"#,
        "The stash name must be provided",
        &["stages[0].options.stash.name"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    options:
      stash:
        name: things
    steps:
      - command: ls
"#,
        "files to stash must be provided",
        &["stages[0].options.stash.files"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: only
    options:
      unstash:
        dir: somewhere
    steps:
      - command: ls
"#,
        "The unstash name must be provided",
        &["stages[0].options.unstash.name"],
    ),
    (
        r#"
agent:
  image: some-image
environment:
  - value: orphan
stages:
  - name: only
    steps:
      - command: ls
"#,
        "missing field(s)",
        &["environment[0].name"],
    ),
    (
        r#"
agent:
  image: some-image
stages:
  - name: Parent
    parallel:
      - name: fine
        steps:
          - command: ls
      - name: broken
        steps:
          - args: [only-args]
"#,
        "expected exactly one, got neither",
        &[
            "stages[0].parallel[1].steps[0].command",
            "stages[0].parallel[1].steps[0].step",
            "stages[0].parallel[1].steps[0].loop",
        ],
    ),
];

#[test]
fn test_validation_failures() {
    for (yaml, message, paths) in CASES {
        // an unknown key is a decode error, not a validation error
        if message.is_empty() {
            assert!(pipeline_syntax::PipelineConfig::from_yaml(yaml).is_err());
            continue;
        }

        let err = validation_error(yaml);
        assert_eq!(&err.message, message, "document:\n{}", yaml);
        assert_eq!(&err.rendered_paths(), paths, "document:\n{}", yaml);
        assert!(err.details.is_none());
    }
}

#[test]
fn test_duplicate_stage_names_are_aggregated() {
    let err = validation_error(
        r#"
agent:
  image: some-image
stages:
  - name: A Working title
    steps:
      - command: ls
  - name: Parent
    parallel:
      - name: A Working title 2
        steps:
          - command: ls
      - name: A Working title
        steps:
          - command: ls
  - name: A Working title 2
    steps:
      - command: ls
"#,
    );

    assert_eq!(err.message, "Stage names must be unique");
    assert!(err.paths.is_empty());
    assert_eq!(
        err.details.as_deref(),
        Some("The following stage names are used more than once: 'A Working title 2', 'A Working title'")
    );
}

#[test]
fn test_path_segments_are_structured() {
    let err = validation_error(
        r#"
agent:
  image: some-image
stages:
  - name: Parent
    stages:
      - name: child
        steps:
          - loop:
              variable: V
              values: [a]
"#,
    );

    assert_eq!(
        err.paths[0].segments(),
        &[
            PathSegment::Index("stages".to_string(), 0),
            PathSegment::Index("stages".to_string(), 0),
            PathSegment::Index("steps".to_string(), 0),
            PathSegment::Field("loop".to_string()),
            PathSegment::Field("steps".to_string()),
        ]
    );
    assert_eq!(
        err.to_string(),
        "missing field(s): stages[0].stages[0].steps[0].loop.steps"
    );
}

#[test]
fn test_first_error_wins() {
    // the agent problem in the first stage is found before the bad timeout
    let err = validation_error(
        r#"
stages:
  - name: first
    steps:
      - command: ls
  - name: second
    agent:
      image: some-image
    options:
      timeout:
        time: -1
    steps:
      - command: ls
"#,
    );

    assert_eq!(err.rendered_paths(), vec!["stages[0].agent"]);
}
