/// One entry of a script-provided argument list.
///
/// Script arrays may mix positional and named elements; only positional
/// ones end up on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Positional(String),
    Named { name: String, value: String },
}

impl Arg {
    pub fn positional(value: impl Into<String>) -> Self {
        Arg::Positional(value.into())
    }

    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        Arg::Named {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Positional(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Positional(value)
    }
}

/// Split `args` into the positional argument vector and the names of the
/// ignored named entries.
pub(crate) fn split_args(args: &[Arg]) -> (Vec<String>, Vec<&str>) {
    let mut argv = Vec::with_capacity(args.len());
    let mut ignored = Vec::new();
    for arg in args {
        match arg {
            Arg::Positional(v) => argv.push(v.clone()),
            Arg::Named { name, .. } => ignored.push(name.as_str()),
        }
    }
    (argv, ignored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_entries_are_separated() {
        let args = vec![
            Arg::from("ls"),
            Arg::named("verbose", "1"),
            Arg::positional("-l"),
        ];
        let (argv, ignored) = split_args(&args);

        assert_eq!(argv, vec!["ls".to_string(), "-l".to_string()]);
        assert_eq!(ignored, vec!["verbose"]);
    }
}
