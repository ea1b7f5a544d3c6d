// Macros for user-facing output. Logs go through tracing; these print the
// results a user asked for.

#[macro_export]
macro_rules! ui_ok {
    ($($arg:tt)*) => {{
        println!("✔ {}", format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! ui_warn {
    ($($arg:tt)*) => {{
        use std::io::IsTerminal;
        let show_icon = std::io::stderr().is_terminal() && std::env::var_os("NO_ICONS").is_none();
        if show_icon {
            eprintln!("⚠ {}", format!($($arg)*));
        } else {
            eprintln!("{}", format!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! ui_err {
    ($($arg:tt)*) => {{
        eprintln!("✖ {}", format!($($arg)*));
    }};
}
