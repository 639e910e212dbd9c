#[derive(Clone, Copy, Debug)]
pub struct CommandHelp {
    pub command: &'static str,
    pub usage: &'static str,
}

pub(crate) const NO_ARG_COMMANDS: &[&str] = &[
    "help",
    "clear_overlay",
    "remove",
    "clear_mask",
    "regenerate",
    "continue",
    "send_to_enhance",
    "close",
    "undo",
    "status",
    "quit",
];

pub(crate) const PATH_COMMANDS: &[&str] = &["upload", "overlay", "save"];

pub const SESSION_HELP: &[CommandHelp] = &[
    CommandHelp {
        command: "/view",
        usage: "/view create|enhance",
    },
    CommandHelp {
        command: "/mode",
        usage: "/mode enhance|edit",
    },
    CommandHelp {
        command: "/style",
        usage: "/style <label>",
    },
    CommandHelp {
        command: "/intensity",
        usage: "/intensity <1-100>",
    },
    CommandHelp {
        command: "/brush",
        usage: "/brush <radius>",
    },
    CommandHelp {
        command: "/resolution",
        usage: "/resolution 1K|2K|4K|WxH|W:H",
    },
    CommandHelp {
        command: "/upload",
        usage: "/upload <path>",
    },
    CommandHelp {
        command: "/overlay",
        usage: "/overlay <path>",
    },
    CommandHelp {
        command: "/clear_overlay",
        usage: "/clear_overlay",
    },
    CommandHelp {
        command: "/remove",
        usage: "/remove",
    },
    CommandHelp {
        command: "/stroke",
        usage: "/stroke x,y x,y ...",
    },
    CommandHelp {
        command: "/clear_mask",
        usage: "/clear_mask",
    },
    CommandHelp {
        command: "/generate",
        usage: "/generate <prompt>",
    },
    CommandHelp {
        command: "/process",
        usage: "/process [edit instruction]",
    },
    CommandHelp {
        command: "/refine",
        usage: "/refine <text>",
    },
    CommandHelp {
        command: "/use",
        usage: "/use <suggestion number>",
    },
    CommandHelp {
        command: "/regenerate",
        usage: "/regenerate",
    },
    CommandHelp {
        command: "/continue",
        usage: "/continue",
    },
    CommandHelp {
        command: "/send_to_enhance",
        usage: "/send_to_enhance",
    },
    CommandHelp {
        command: "/close",
        usage: "/close",
    },
    CommandHelp {
        command: "/undo",
        usage: "/undo",
    },
    CommandHelp {
        command: "/save",
        usage: "/save <path>",
    },
    CommandHelp {
        command: "/status",
        usage: "/status",
    },
    CommandHelp {
        command: "/quit",
        usage: "/quit",
    },
];
