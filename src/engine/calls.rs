use crate::engine::turn::ToolCall;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub text: String,
    pub reason: String,
}

pub fn extract_tool_calls(text: &str, allowed: &[String]) -> (Vec<ToolCall>, Vec<RejectedLine>) {
    let mut calls = Vec::new();
    let mut rejected = Vec::new();
    let mut offset = 0usize;

    for line in text.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            offset += line.len() + 1;
            continue;
        }
        let start = offset + (line.len() - line.trim_start().len());
        let end = start + trimmed.len();

        if let Some(open) = trimmed.find('(') {
            let name = trimmed[..open].trim();
            if is_identifier(name) && trimmed.ends_with(')') {
                if !allowed.iter().any(|tool| tool == name) {
                    rejected.push(RejectedLine {
                        text: trimmed.to_string(),
                        reason: format!("unknown tool `{name}`"),
                    });
                } else {
                    let body = &trimmed[open + 1..trimmed.len() - 1];
                    match split_args(body) {
                        Ok(args) => calls.push(ToolCall {
                            name: name.to_string(),
                            args,
                            source_span: [start, end],
                        }),
                        Err(reason) => rejected.push(RejectedLine {
                            text: trimmed.to_string(),
                            reason,
                        }),
                    }
                }
            }
        }

        offset += line.len() + 1;
    }

    (calls, rejected)
}

pub fn parse_action_lines(lines: &[String], catalog: &[String]) -> Vec<ToolCall> {
    let joined = lines.join("\n");
    extract_tool_calls(&joined, catalog).0
}

pub fn compose_story(calls: &[ToolCall]) -> String {
    let rendered: Vec<String> = calls.iter().map(ToolCall::render).collect();
    format!(
        "I see the screen with previous actions marked.\n\n{}\n",
        rendered.join("\n")
    )
}

pub fn system_prompt_for(allowed: &[String]) -> String {
    let signatures: Vec<String> = allowed.iter().map(|name| signature_for(name)).collect();
    format!(
        "You are a computer control agent driving a desktop through annotated screenshots.\n\
         You can ONLY use these functions:\n\n{}\n\n\
         Rules:\n\
         - Use ONLY the functions above.\n\
         - Respond with exactly two parts:\n\
         \x20 PART 1 -- Short report (2-4 sentences)\n\
         \x20 PART 2 -- Actions (only function calls, one per line)\n\
         - Always give at least two actions.\n\
         - Coordinates are in the 0-1000 range.\n",
        signatures.join("\n")
    )
}

pub fn derive_coords(args: &[String]) -> Option<[i64; 2]> {
    let x = args.first()?.parse::<i64>().ok()?;
    let y = args.get(1)?.parse::<i64>().ok()?;
    if (0..=1000).contains(&x) && (0..=1000).contains(&y) {
        Some([x, y])
    } else {
        None
    }
}

fn signature_for(name: &str) -> String {
    match name {
        "click" | "right_click" | "double_click" => format!("{name}(x, y)"),
        "drag" => "drag(x1, y1, x2, y2)".to_string(),
        "write" => "write(text)".to_string(),
        "remember" => "remember(text)".to_string(),
        "recall" => "recall()".to_string(),
        other => format!("{other}(...)"),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn split_args(body: &str) -> Result<Vec<String>, String> {
    let mut args: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_quoted = false;
    let mut quote: Option<char> = None;
    let mut chars = body.chars();

    let finish = |text: &mut String, quoted: bool| -> String {
        let raw = std::mem::take(text);
        if quoted {
            raw
        } else {
            raw.trim().to_string()
        }
    };

    while let Some(ch) = chars.next() {
        match quote {
            Some(q) => {
                if ch == '\\' {
                    match chars.next() {
                        Some(escaped) => current.push(escaped),
                        None => return Err("dangling escape in string argument".to_string()),
                    }
                } else if ch == q {
                    quote = None;
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '"' | '\'' => {
                    quote = Some(ch);
                    current_quoted = true;
                }
                ',' => {
                    args.push(finish(&mut current, current_quoted));
                    current_quoted = false;
                }
                _ => current.push(ch),
            },
        }
    }

    if quote.is_some() {
        return Err("unterminated string argument".to_string());
    }
    let last = finish(&mut current, current_quoted);
    if !last.is_empty() || current_quoted || !args.is_empty() {
        args.push(last);
    }
    Ok(args)
}
