//! End-to-end engine tests: forward post-images, backward pre-images,
//! cycle widening, and failure modes, driven through parsed depgraphs.

use strand_automata::StringAutomaton;
use strand_core::analysis::{AnalysisResult, ImageComputer};
use strand_core::depgraph::parse_str;
use strand_core::error::AnalysisError;

fn seeded_result(
    graph: &strand_core::depgraph::DepGraph,
    field: &str,
) -> (strand_core::depgraph::NodeId, AnalysisResult) {
    let input = graph.find_input(field).expect("input node");
    let mut result = AnalysisResult::new();
    for uninit in graph.uninit_nodes() {
        result.set(uninit, StringAutomaton::empty_set());
    }
    result.set(input, StringAutomaton::any_string());
    (input, result)
}

#[test]
fn concat_post_image_is_exact() {
    // root = concat("ab", input), input unconstrained.
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: concat"];
            n3 [label="Lit: ab"];
            n4 [label="Input: x"];
            n1 -> n2;
            n2 -> n3;
            n2 -> n4;
        }"#,
    )
    .unwrap();
    let (input, mut result) = seeded_result(&graph, "x");
    let mut computer = ImageComputer::default();
    computer
        .forward_analysis_single_input(&graph, input, &mut result)
        .unwrap();

    let root = graph.root().unwrap();
    let post = result.get(root).unwrap();
    assert!(post.accepts("abXYZ"));
    assert!(post.accepts("ab"));
    assert!(!post.accepts("xyz"));
    // Exactly {"ab"}·Σ*.
    let expected = StringAutomaton::literal("ab").concat(&StringAutomaton::any_string());
    assert!(post.equals(&expected));
}

#[test]
fn forward_soundness_on_concrete_evaluations() {
    // root = htmlspecialchars(concat("x", input)). Every concrete
    // evaluation must land inside the abstract post-image.
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: htmlspecialchars"];
            n3 [label="Op: concat"];
            n4 [label="Lit: x"];
            n5 [label="Input: q"];
            n1 -> n2;
            n2 -> n3;
            n3 -> n4;
            n3 -> n5;
        }"#,
    )
    .unwrap();
    let (input, mut result) = seeded_result(&graph, "q");
    let mut computer = ImageComputer::default();
    computer
        .forward_analysis_single_input(&graph, input, &mut result)
        .unwrap();
    let post = result.get(graph.root().unwrap()).unwrap();

    // Concrete: htmlspecialchars("x" . v) for sample inputs v.
    for (input_value, output) in [
        ("", "x"),
        ("hello", "xhello"),
        ("<s>", "x&lt;s&gt;"),
        ("a&b", "xa&amp;b"),
        ("\"q\"", "x&quot;q&quot;"),
    ] {
        assert!(
            post.accepts(output),
            "concrete output {output:?} for input {input_value:?} must be covered"
        );
    }
    assert!(!post.accepts("x<raw"), "raw '<' cannot be produced");
}

#[test]
fn restrict_intersects_with_the_guard_pattern() {
    // root = __vlab_restrict(/[0-9]+/, input, false) over Σ* is [0-9]+
    // matched anywhere, intersected with any string.
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: __vlab_restrict"];
            n3 [label="Lit: /^[0-9]+$/"];
            n4 [label="Input: x"];
            n5 [label="Lit: false"];
            n1 -> n2;
            n2 -> n3;
            n2 -> n4;
            n2 -> n5;
        }"#,
    )
    .unwrap();
    let (input, mut result) = seeded_result(&graph, "x");
    let mut computer = ImageComputer::default();
    computer
        .forward_analysis_single_input(&graph, input, &mut result)
        .unwrap();
    let post = result.get(graph.root().unwrap()).unwrap();

    assert!(post.accepts("0123"));
    assert!(post.accepts("7"));
    assert!(!post.accepts(""));
    assert!(!post.accepts("12a"));
}

#[test]
fn unmodeled_operator_fails_loudly() {
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: custom_sanitize"];
            n3 [label="Input: x"];
            n1 -> n2;
            n2 -> n3;
        }"#,
    )
    .unwrap();
    let (input, mut result) = seeded_result(&graph, "x");
    let mut computer = ImageComputer::default();
    let err = computer
        .forward_analysis_single_input(&graph, input, &mut result)
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::NotImplemented { ref op, .. } if op == "custom_sanitize"
    ));
    assert_eq!(computer.unmodeled().len(), 1);
}

#[test]
fn wrong_arity_is_a_malformed_graph() {
    // substr with a single operand.
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: substr"];
            n3 [label="Input: x"];
            n1 -> n2;
            n2 -> n3;
        }"#,
    )
    .unwrap();
    let (input, mut result) = seeded_result(&graph, "x");
    let mut computer = ImageComputer::default();
    let err = computer
        .forward_analysis_single_input(&graph, input, &mut result)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::MalformedDepgraph { .. }));
}

#[test]
fn negative_substr_start_is_rejected() {
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: substr"];
            n3 [label="Input: x"];
            n4 [label="Lit: -2"];
            n1 -> n2;
            n2 -> n3;
            n2 -> n4;
        }"#,
    )
    .unwrap();
    let (input, mut result) = seeded_result(&graph, "x");
    let mut computer = ImageComputer::default();
    let err = computer
        .forward_analysis_single_input(&graph, input, &mut result)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidArgument { .. }));
}

#[test]
fn substr_zero_length_loses_everything() {
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: substr"];
            n3 [label="Input: x"];
            n4 [label="Lit: 1"];
            n5 [label="Lit: 0"];
            n1 -> n2;
            n2 -> n3;
            n2 -> n4;
            n2 -> n5;
        }"#,
    )
    .unwrap();
    let (input, mut result) = seeded_result(&graph, "x");
    let mut computer = ImageComputer::default();
    computer
        .forward_analysis_single_input(&graph, input, &mut result)
        .unwrap();
    let post = result.get(graph.root().unwrap()).unwrap();
    assert!(post.is_empty_string(), "substr(_, 0) is the empty string");
}

#[test]
fn memoization_makes_recomputation_a_no_op() {
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: strtoupper"];
            n3 [label="Lit: abc"];
            n1 -> n2;
            n2 -> n3;
        }"#,
    )
    .unwrap();
    let root = graph.root().unwrap();
    let mut result = AnalysisResult::new();
    let mut computer = ImageComputer::default();
    computer.forward_analysis(&graph, root, &mut result).unwrap();
    let first = result.get(root).unwrap().clone();
    let count = result.len();

    computer.forward_analysis(&graph, root, &mut result).unwrap();
    assert_eq!(result.len(), count);
    assert!(result.get(root).unwrap().equals(&first));
    assert!(first.accepts("ABC"));
}

#[test]
fn scc_fixed_point_terminates_and_covers_unrollings() {
    // x = "a" | concat(x, "b"): a self-concatenating loop whose exact
    // fixpoint is a·b*.
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Var: x"];
            n3 [label="Lit: a"];
            n4 [label="Op: concat"];
            n5 [label="Lit: b"];
            n1 -> n2;
            n2 -> n3;
            n2 -> n4;
            n4 -> n2;
            n4 -> n5;
        }"#,
    )
    .unwrap();
    let root = graph.root().unwrap();
    let mut result = AnalysisResult::new();
    let mut computer = ImageComputer::default();
    computer.forward_analysis(&graph, root, &mut result).unwrap();

    let value = result.get(root).unwrap();
    // Sound for every finite unrolling.
    assert!(value.accepts("a"));
    assert!(value.accepts("ab"));
    assert!(value.accepts("abbbbbbbb"));
    // And not collapsed to something absurd.
    assert!(!value.accepts(""));
    assert!(!value.accepts("b"));
}

#[test]
fn backward_recovers_attack_inputs_through_concat() {
    // root = concat("ab", input); target: root values containing '<'.
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: concat"];
            n3 [label="Lit: ab"];
            n4 [label="Input: x"];
            n1 -> n2;
            n2 -> n3;
            n2 -> n4;
        }"#,
    )
    .unwrap();
    let (input, mut result) = seeded_result(&graph, "x");
    let mut computer = ImageComputer::default();
    computer
        .forward_analysis_single_input(&graph, input, &mut result)
        .unwrap();

    let root = graph.root().unwrap();
    let post = result.get(root).unwrap();
    let target = StringAutomaton::compile_regex("<", strand_automata::RegexMode::Contains).unwrap();
    let overlap = post.intersect(&target);
    assert!(!overlap.is_empty());

    let sub = graph.input_relevant(input).unwrap();
    let backward = computer
        .backward_analysis(&sub, &overlap, &result)
        .unwrap();
    let pre = backward.get(input).unwrap();

    // Round-trip: a witness from the pre-image, replayed concretely,
    // must land in the target language.
    let witness = pre.example().expect("pre-image is non-empty");
    let replayed = format!("ab{witness}");
    assert!(target.accepts(&replayed), "replayed {replayed:?}");
    // And the pre-image never claims inputs that cannot reach it.
    assert!(!pre.accepts("harmless"));
    assert!(pre.accepts("<"));
}

#[test]
fn backward_through_escaping_is_empty_when_sanitized() {
    // root = htmlspecialchars(input): no input produces a raw '<'.
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Op: htmlspecialchars"];
            n3 [label="Input: x"];
            n1 -> n2;
            n2 -> n3;
        }"#,
    )
    .unwrap();
    let (input, mut result) = seeded_result(&graph, "x");
    let mut computer = ImageComputer::default();
    computer
        .forward_analysis_single_input(&graph, input, &mut result)
        .unwrap();

    let post = result.get(graph.root().unwrap()).unwrap();
    let target = StringAutomaton::compile_regex("<", strand_automata::RegexMode::Contains).unwrap();
    assert!(
        post.intersect(&target).is_empty(),
        "escaped output can never contain a raw '<'"
    );
}

#[test]
fn backward_scc_respects_forward_filter() {
    // Loop graph as above; backward from a target that the forward pass
    // proves only partially reachable.
    let graph = parse_str(
        r#"digraph d {
            n1 [label="Var: root"];
            n2 [label="Var: x"];
            n3 [label="Lit: a"];
            n4 [label="Op: concat"];
            n5 [label="Lit: b"];
            n1 -> n2;
            n2 -> n3;
            n2 -> n4;
            n4 -> n2;
            n4 -> n5;
        }"#,
    )
    .unwrap();
    let root = graph.root().unwrap();
    let mut result = AnalysisResult::new();
    let mut computer = ImageComputer::default();
    computer.forward_analysis(&graph, root, &mut result).unwrap();

    let sub = graph.as_subgraph().unwrap();
    let target = StringAutomaton::any_string();
    let backward = computer.backward_analysis(&sub, &target, &result).unwrap();

    // Backward values never exceed the forward ones (the root is exempt:
    // it carries the caller's seed verbatim).
    for (node, bw_value) in backward.iter() {
        if node == root {
            continue;
        }
        if let Some(fw_value) = result.get(node) {
            assert!(
                bw_value.is_subset_of(fw_value),
                "backward value exceeds forward value at node {}",
                strand_core::depgraph::node_index(node)
            );
        }
    }
}
