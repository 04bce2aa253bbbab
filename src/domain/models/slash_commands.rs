#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
    remainder: String,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let trimmed = text.trim();
        let remainder = trimmed
            .split_once(char::is_whitespace)
            .map(|(_, rest)| return rest.trim().to_string())
            .unwrap_or_default();

        let mut args = trimmed
            .split_whitespace()
            .filter(|e| return !e.is_empty())
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        if args.is_empty() {
            return None;
        }
        let prefix = args[0].to_string();
        args.remove(0);

        let cmd = SlashCommand {
            command: prefix,
            args,
            remainder,
        };
        if cmd.is_quit()
            || cmd.is_help()
            || cmd.is_save()
            || cmd.is_new()
            || cmd.is_load()
            || cmd.is_sessions()
            || cmd.is_role_set()
            || cmd.is_role_list()
            || cmd.is_rename()
            || cmd.is_delete()
            || cmd.is_export()
        {
            return Some(cmd);
        }

        return None;
    }

    /// Everything typed after the command, with inner spacing kept.
    pub fn rest(&self) -> String {
        return self.remainder.to_string();
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }

    pub fn is_save(&self) -> bool {
        return ["/s", "/save"].contains(&self.command.as_str());
    }

    pub fn is_new(&self) -> bool {
        return ["/n", "/new"].contains(&self.command.as_str());
    }

    pub fn is_load(&self) -> bool {
        return ["/l", "/load"].contains(&self.command.as_str());
    }

    pub fn is_sessions(&self) -> bool {
        return ["/ls", "/sessions"].contains(&self.command.as_str());
    }

    pub fn is_role_set(&self) -> bool {
        return ["/role"].contains(&self.command.as_str()) && !self.args.is_empty();
    }

    pub fn is_role_list(&self) -> bool {
        return ["/roles"].contains(&self.command.as_str())
            || (self.command == "/role" && self.args.is_empty());
    }

    pub fn is_rename(&self) -> bool {
        return ["/rename"].contains(&self.command.as_str()) && !self.args.is_empty();
    }

    pub fn is_delete(&self) -> bool {
        return ["/delete"].contains(&self.command.as_str());
    }

    pub fn is_export(&self) -> bool {
        return ["/export"].contains(&self.command.as_str());
    }
}
