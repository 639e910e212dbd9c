use super::command_registry::{NO_ARG_COMMANDS, PATH_COMMANDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChoice {
    Create,
    Enhance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChoice {
    Enhancement,
    GuidedEdit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Noop,
    Help,
    Quit,
    Status,
    SetView(ViewChoice),
    SetMode(ModeChoice),
    SetStyle(String),
    SetIntensity(u8),
    SetBrush(f32),
    SetResolution(String),
    Upload(String),
    Overlay(String),
    ClearOverlay,
    RemoveBase,
    Stroke(Vec<(f32, f32)>),
    ClearMask,
    Generate(String),
    Process(Option<String>),
    Refine(String),
    UseSuggestion(usize),
    Regenerate,
    Continue,
    SendToEnhance,
    Close,
    Undo,
    Save(String),
    /// Plain text, interpreted against the current view.
    Prompt(String),
    Invalid { command: String, reason: String },
    Unknown { command: String, arg: String },
}

fn parse_single_path_arg(arg: &str) -> String {
    if arg.trim().is_empty() {
        return String::new();
    }
    let parts = match shell_words::split(arg) {
        Ok(parts) => parts,
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    parts
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>()
        .join(" ")
}

/// Parses `x,y x,y ...` into display-space points.
pub fn parse_points(arg: &str) -> Result<Vec<(f32, f32)>, String> {
    let mut points = Vec::new();
    for token in arg.split_whitespace() {
        let Some((x, y)) = token.split_once(',') else {
            return Err(format!("expected x,y but got '{token}'"));
        };
        let x = x
            .trim()
            .parse::<f32>()
            .map_err(|_| format!("invalid x coordinate in '{token}'"))?;
        let y = y
            .trim()
            .parse::<f32>()
            .map_err(|_| format!("invalid y coordinate in '{token}'"))?;
        if !x.is_finite() || !y.is_finite() {
            return Err(format!("non-finite coordinate in '{token}'"));
        }
        points.push((x, y));
    }
    if points.is_empty() {
        return Err("a stroke needs at least one point".to_string());
    }
    Ok(points)
}

fn invalid(command: &str, reason: impl Into<String>) -> SessionCommand {
    SessionCommand::Invalid {
        command: command.to_string(),
        reason: reason.into(),
    }
}

fn no_arg_command(command: &str) -> SessionCommand {
    match command {
        "help" => SessionCommand::Help,
        "clear_overlay" => SessionCommand::ClearOverlay,
        "remove" => SessionCommand::RemoveBase,
        "clear_mask" => SessionCommand::ClearMask,
        "regenerate" => SessionCommand::Regenerate,
        "continue" => SessionCommand::Continue,
        "send_to_enhance" => SessionCommand::SendToEnhance,
        "close" => SessionCommand::Close,
        "undo" => SessionCommand::Undo,
        "status" => SessionCommand::Status,
        _ => SessionCommand::Quit,
    }
}

fn path_command(command: &str, path: String) -> SessionCommand {
    if path.is_empty() {
        return invalid(command, format!("/{command} requires a path"));
    }
    match command {
        "upload" => SessionCommand::Upload(path),
        "overlay" => SessionCommand::Overlay(path),
        _ => SessionCommand::Save(path),
    }
}

pub fn parse_command(text: &str) -> SessionCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return SessionCommand::Prompt(raw_trimmed.to_string());
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return SessionCommand::Prompt(raw_trimmed.to_string());
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if NO_ARG_COMMANDS.contains(&command.as_str()) {
        return no_arg_command(&command);
    }
    if PATH_COMMANDS.contains(&command.as_str()) {
        return path_command(&command, parse_single_path_arg(arg));
    }

    match command.as_str() {
        "view" => match arg.to_ascii_lowercase().as_str() {
            "create" => SessionCommand::SetView(ViewChoice::Create),
            "enhance" => SessionCommand::SetView(ViewChoice::Enhance),
            _ => invalid(&command, "expected create or enhance"),
        },
        "mode" => match arg.to_ascii_lowercase().as_str() {
            "enhance" | "enhancement" => SessionCommand::SetMode(ModeChoice::Enhancement),
            "edit" | "guided" | "guided_edit" => SessionCommand::SetMode(ModeChoice::GuidedEdit),
            _ => invalid(&command, "expected enhance or edit"),
        },
        "style" if !arg.is_empty() => SessionCommand::SetStyle(arg.to_string()),
        "style" => invalid(&command, "/style requires a label"),
        "intensity" => match arg.parse::<u32>() {
            Ok(value) if (1..=100).contains(&value) => SessionCommand::SetIntensity(value as u8),
            _ => invalid(&command, "intensity must be an integer from 1 to 100"),
        },
        "brush" => match arg.parse::<f32>() {
            Ok(value) if value.is_finite() && value > 0.0 => SessionCommand::SetBrush(value),
            _ => invalid(&command, "brush radius must be a positive number"),
        },
        "resolution" if !arg.is_empty() => SessionCommand::SetResolution(arg.to_string()),
        "resolution" => invalid(&command, "/resolution requires 1K, 2K, 4K, WxH or W:H"),
        "stroke" => match parse_points(arg) {
            Ok(points) => SessionCommand::Stroke(points),
            Err(reason) => invalid(&command, reason),
        },
        "generate" if !arg.is_empty() => SessionCommand::Generate(arg.to_string()),
        "generate" => invalid(&command, "/generate requires a prompt"),
        "process" => SessionCommand::Process(Some(arg.to_string()).filter(|value| !value.is_empty())),
        "refine" if !arg.is_empty() => SessionCommand::Refine(arg.to_string()),
        "refine" => invalid(&command, "/refine requires text"),
        "use" => match arg.parse::<usize>() {
            Ok(value) if value >= 1 => SessionCommand::UseSuggestion(value - 1),
            _ => invalid(&command, "/use expects a suggestion number starting at 1"),
        },
        _ => SessionCommand::Unknown {
            command,
            arg: arg.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_command, parse_points, ModeChoice, SessionCommand, ViewChoice};

    #[test]
    fn plain_text_is_a_prompt() {
        assert_eq!(
            parse_command("  make the walls white "),
            SessionCommand::Prompt("make the walls white".to_string())
        );
        assert_eq!(parse_command("   "), SessionCommand::Noop);
    }

    #[test]
    fn parse_quoted_upload_path() {
        assert_eq!(
            parse_command("/upload \"/tmp/site plan.png\""),
            SessionCommand::Upload("/tmp/site plan.png".to_string())
        );
        assert!(matches!(
            parse_command("/save"),
            SessionCommand::Invalid { .. }
        ));
    }

    #[test]
    fn parse_view_and_mode() {
        assert_eq!(
            parse_command("/view Enhance"),
            SessionCommand::SetView(ViewChoice::Enhance)
        );
        assert_eq!(
            parse_command("/mode edit"),
            SessionCommand::SetMode(ModeChoice::GuidedEdit)
        );
        assert!(matches!(
            parse_command("/mode sideways"),
            SessionCommand::Invalid { .. }
        ));
    }

    #[test]
    fn parse_intensity_bounds() {
        assert_eq!(parse_command("/intensity 40"), SessionCommand::SetIntensity(40));
        assert!(matches!(
            parse_command("/intensity 0"),
            SessionCommand::Invalid { .. }
        ));
        assert!(matches!(
            parse_command("/intensity 101"),
            SessionCommand::Invalid { .. }
        ));
    }

    #[test]
    fn parse_stroke_points() {
        assert_eq!(
            parse_command("/stroke 1,2 3.5,4"),
            SessionCommand::Stroke(vec![(1.0, 2.0), (3.5, 4.0)])
        );
        assert!(parse_points("1;2").is_err());
        assert!(parse_points("").is_err());
    }

    #[test]
    fn parse_process_with_and_without_prompt() {
        assert_eq!(parse_command("/process"), SessionCommand::Process(None));
        assert_eq!(
            parse_command("/process add a green roof"),
            SessionCommand::Process(Some("add a green roof".to_string()))
        );
    }

    #[test]
    fn parse_resolution_preset() {
        assert_eq!(
            parse_command("/resolution 16:9"),
            SessionCommand::SetResolution("16:9".to_string())
        );
        assert!(matches!(
            parse_command("/resolution"),
            SessionCommand::Invalid { .. }
        ));
    }

    #[test]
    fn parse_use_is_one_based() {
        assert_eq!(parse_command("/use 2"), SessionCommand::UseSuggestion(1));
        assert!(matches!(parse_command("/use 0"), SessionCommand::Invalid { .. }));
    }

    #[test]
    fn parse_unknown_command() {
        assert_eq!(
            parse_command("/magic foo bar"),
            SessionCommand::Unknown {
                command: "magic".to_string(),
                arg: "foo bar".to_string()
            }
        );
    }
}
