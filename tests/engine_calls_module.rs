use vigil::engine::calls::{
    compose_story, derive_coords, extract_tool_calls, parse_action_lines, system_prompt_for,
};
use vigil::engine::turn::ToolCall;

fn allowed() -> Vec<String> {
    ["click", "right_click", "double_click", "drag", "write"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn extracts_calls_and_skips_prose() {
    let text = "I will click the search box, then type.\n\nclick(120, 340)\nwrite(\"hello\")\n";
    let (calls, rejected) = extract_tool_calls(text, &allowed());
    assert!(rejected.is_empty());
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].name, "click");
    assert_eq!(calls[0].args, vec!["120".to_string(), "340".to_string()]);
    assert_eq!(calls[1].name, "write");
    assert_eq!(calls[1].args, vec!["hello".to_string()]);
}

#[test]
fn source_spans_point_into_the_original_text() {
    let text = "report line\n  click(1, 2)\nwrite(\"x\")";
    let (calls, _) = extract_tool_calls(text, &allowed());
    assert_eq!(calls.len(), 2);
    let [start, end] = calls[0].source_span;
    assert_eq!(&text[start..end], "click(1, 2)");
    let [start, end] = calls[1].source_span;
    assert_eq!(&text[start..end], "write(\"x\")");
}

#[test]
fn unknown_tool_is_rejected_not_dropped() {
    let text = "click(1, 2)\nteleport(3, 4)\n";
    let (calls, rejected) = extract_tool_calls(text, &allowed());
    assert_eq!(calls.len(), 1);
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].reason.contains("teleport"));
}

#[test]
fn unterminated_string_is_rejected() {
    let text = "write(\"unclosed)\n";
    let (calls, rejected) = extract_tool_calls(text, &allowed());
    assert!(calls.is_empty());
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].reason.contains("unterminated"));
}

#[test]
fn quoted_args_keep_commas_and_spaces() {
    let text = "write(\"hi, there \")\n";
    let (calls, _) = extract_tool_calls(text, &allowed());
    assert_eq!(calls[0].args, vec!["hi, there ".to_string()]);
}

#[test]
fn drag_takes_four_args() {
    let (calls, _) = extract_tool_calls("drag(10, 20, 30, 40)", &allowed());
    assert_eq!(calls[0].args.len(), 4);
}

#[test]
fn no_arg_call_parses_empty() {
    let catalog = vec!["recall".to_string()];
    let (calls, _) = extract_tool_calls("recall()", &catalog);
    assert_eq!(calls.len(), 1);
    assert!(calls[0].args.is_empty());
}

#[test]
fn default_action_lines_parse_against_the_catalog() {
    let defaults = vec![
        "click(500, 500)".to_string(),
        "click(500, 500)".to_string(),
    ];
    let catalog = vec!["click".to_string()];
    let calls = parse_action_lines(&defaults, &catalog);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].render(), "click(500, 500)");
}

#[test]
fn compose_story_round_trips_through_the_parser() {
    let calls = vec![
        ToolCall {
            name: "click".to_string(),
            args: vec!["10".to_string(), "20".to_string()],
            source_span: [0, 0],
        },
        ToolCall {
            name: "click".to_string(),
            args: vec!["30".to_string(), "40".to_string()],
            source_span: [0, 0],
        },
    ];
    let story = compose_story(&calls);
    assert!(story.starts_with("I see the screen with previous actions marked."));
    let (reparsed, rejected) = extract_tool_calls(&story, &allowed());
    assert!(rejected.is_empty());
    assert_eq!(reparsed.len(), 2);
    assert_eq!(reparsed[0].render(), "click(10, 20)");
}

#[test]
fn rendered_string_args_survive_reparsing() {
    let text = "write(\"hi, there\")\nclick(10, 20)\n";
    let (calls, _) = extract_tool_calls(text, &allowed());
    assert_eq!(calls[0].render(), "write(\"hi, there\")");

    let story = compose_story(&calls);
    let (reparsed, rejected) = extract_tool_calls(&story, &allowed());
    assert!(rejected.is_empty());
    assert_eq!(reparsed[0].args, vec!["hi, there".to_string()]);
    assert_eq!(reparsed[1].render(), "click(10, 20)");
}

#[test]
fn system_prompt_lists_only_allowed_tools() {
    let prompt = system_prompt_for(&["click".to_string(), "drag".to_string()]);
    assert!(prompt.contains("click(x, y)"));
    assert!(prompt.contains("drag(x1, y1, x2, y2)"));
    assert!(!prompt.contains("write("));
    assert!(prompt.contains("at least two actions"));
}

#[test]
fn coords_derive_only_inside_the_virtual_space() {
    assert_eq!(
        derive_coords(&["100".to_string(), "200".to_string()]),
        Some([100, 200])
    );
    assert_eq!(derive_coords(&["1001".to_string(), "200".to_string()]), None);
    assert_eq!(derive_coords(&["hello".to_string()]), None);
    assert_eq!(derive_coords(&[]), None);
}
