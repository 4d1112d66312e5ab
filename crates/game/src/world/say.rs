#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SayCommand<'a> {
    Plain(&'a str),
    Shout(&'a str),
    Tell { name: &'a str, message: &'a str },
    Unknown(&'a str),
}

impl<'a> SayCommand<'a> {
    pub fn parse(text: &'a str) -> Self {
        let Some(command) = text.strip_prefix('/') else {
            return Self::Plain(text);
        };

        let (name, rest) = split_word(command);
        match name.to_ascii_lowercase().as_str() {
            "shout" => Self::Shout(rest),
            "tell" | "whisper" => {
                let (target, message) = split_word(rest);
                Self::Tell {
                    name: target,
                    message,
                }
            }
            _ => Self::Unknown(name),
        }
    }
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text() {
        assert_eq!(SayCommand::parse("hello /there"), SayCommand::Plain("hello /there"));
    }

    #[test]
    fn shout_and_tell() {
        assert_eq!(SayCommand::parse("/shout  hi all "), SayCommand::Shout("hi all"));
        assert_eq!(
            SayCommand::parse("/Tell bob see you"),
            SayCommand::Tell {
                name: "bob",
                message: "see you"
            }
        );
        assert_eq!(
            SayCommand::parse("/tell"),
            SayCommand::Tell {
                name: "",
                message: ""
            }
        );
    }

    #[test]
    fn unknown_command() {
        assert_eq!(SayCommand::parse("/dance now"), SayCommand::Unknown("dance"));
    }
}
