//! Command handler for CLI

use crate::ui;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::sync::Arc;
use wrangler_core::{
    now_millis, BuildInfo, Channel, Error, MemoryStore, MergeResult, NewPost, Post, PostId,
    PostStore, RelocationResult, StagingSlot, User, Wrangler,
};

pub struct CommandHandler {
    store: Arc<MemoryStore>,
    wrangler: Wrangler,

    /// User the REPL acts as
    user: User,
}

impl CommandHandler {
    pub fn new(store: Arc<MemoryStore>, wrangler: Wrangler, user: User) -> Self {
        Self {
            store,
            wrangler,
            user,
        }
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<()> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(());
        }

        match parts[0] {
            "whoami" => self.cmd_whoami(),
            "version" | "about" => self.cmd_version(),
            "as" => self.cmd_as(&parts[1..]),
            "users" => self.cmd_users(),
            "channels" => self.cmd_channels(),
            "posts" => self.cmd_posts(&parts[1..]),
            "thread" => self.cmd_thread(&parts[1..]),
            "actions" => self.cmd_actions(&parts[1..]).await,
            "post" => self.cmd_post(&parts[1..]).await,
            "reply" => self.cmd_reply(&parts[1..]).await,
            "move" => self.cmd_relocate(&parts[1..], true).await,
            "copy" => self.cmd_relocate(&parts[1..], false).await,
            "copy-to-channel" => self.cmd_copy_to_channel(&parts[1..]).await,
            "attach" => self.cmd_attach(&parts[1..]).await,
            "merge" => self.cmd_merge(&parts[1..]).await,
            "staged" => self.cmd_staged(&parts[1..]),
            "expire" => self.cmd_expire(),
            "help" => {
                ui::print_help();
                Ok(())
            }
            _ => {
                ui::print_error(&format!("Unknown command: {}", parts[0]));
                ui::print_info("Type 'help' for available commands");
                Ok(())
            }
        }
    }

    fn cmd_version(&self) -> Result<()> {
        let info = BuildInfo::current();
        println!();
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", format!("  {}", info).bright_cyan().bold());
        println!("{}", "  Thread relocation and consolidation".bright_white());
        println!("{}", "=".repeat(60).bright_blue());
        println!();
        println!("{} {}", "Build:".bright_green(), info.profile);
        println!("{} {}", "Commit:".bright_green(), info.commit.as_deref().unwrap_or("unknown"));
        println!();
        Ok(())
    }

    fn cmd_whoami(&self) -> Result<()> {
        println!();
        println!("{} {}", "Username:".bright_green(), self.user.username.bright_cyan());
        println!("{} {}", "User ID:".bright_green(), self.user.id);
        match self.wrangler.peek_staged(self.user.id) {
            Some(slot) => println!("{} {}", "Staged:".bright_green(), describe_slot(&slot)),
            None => println!("{} {}", "Staged:".bright_green(), "nothing".yellow()),
        }
        println!();
        Ok(())
    }

    fn cmd_as(&mut self, args: &[&str]) -> Result<()> {
        let Some(name) = args.first() else {
            ui::print_error("Usage: as <user>");
            return Ok(());
        };
        let name = name.trim_start_matches('@');
        let user = self
            .store
            .user_by_username(name)
            .with_context(|| format!("No user named {}", name))?;
        if user.is_bot {
            ui::print_warning(&format!("@{} is a bot account", user.username));
        }
        self.user = user;
        ui::print_success(&format!("Now acting as @{}", self.user.username));
        Ok(())
    }

    fn cmd_users(&self) -> Result<()> {
        let users = self.store.users();
        println!();
        println!("{} ({}):", "Users".bright_cyan().bold(), users.len());
        for user in users {
            let marker = if user.id == self.user.id {
                "→".bright_green()
            } else {
                " ".normal()
            };
            let bot = if user.is_bot { " [bot]".bright_black() } else { "".normal() };
            println!("  {} @{}{}", marker, user.username, bot);
        }
        println!();
        Ok(())
    }

    fn cmd_channels(&self) -> Result<()> {
        let channels = self.store.channels();
        println!();
        if channels.is_empty() {
            ui::print_info("No channels in this fixture");
        } else {
            println!("{} ({}):", "Channels".bright_cyan().bold(), channels.len());
            for channel in channels {
                let posts = self.store.channel_posts(channel.id).len();
                println!(
                    "  ~{:<20} {} ({} posts)",
                    channel.name.bright_yellow(),
                    channel.label(),
                    posts
                );
            }
        }
        println!();
        Ok(())
    }

    fn cmd_posts(&self, args: &[&str]) -> Result<()> {
        let Some(name) = args.first() else {
            ui::print_error("Usage: posts <channel>");
            return Ok(());
        };
        let channel = self.resolve_channel(name)?;
        let posts = self.store.channel_posts(channel.id);

        println!();
        println!("{} ~{}:", "Posts in".bright_cyan().bold(), channel.name);
        if posts.is_empty() {
            ui::print_info("No posts yet. Create one with: post <channel> <text>");
        }
        for root in posts.iter().filter(|p| p.is_root()) {
            self.print_post(root);
            for reply in posts.iter().filter(|p| p.root_id == Some(root.id)) {
                self.print_post(reply);
            }
        }
        println!();
        Ok(())
    }

    fn cmd_thread(&self, args: &[&str]) -> Result<()> {
        let Some(prefix) = args.first() else {
            ui::print_error("Usage: thread <post>");
            return Ok(());
        };
        let id = self.resolve_post(prefix)?;
        let root = self
            .store
            .post(id)
            .map(|p| p.thread_root())
            .with_context(|| format!("Post {} disappeared", id))?;

        // Everything, system posts included; collect_thread shows only what relocation sees
        let posts: Vec<Post> = self
            .store
            .all_posts()
            .into_iter()
            .filter(|p| p.thread_root() == root)
            .collect();

        println!();
        for post in &posts {
            self.print_post(post);
        }
        println!();
        Ok(())
    }

    async fn cmd_actions(&self, args: &[&str]) -> Result<()> {
        let Some(prefix) = args.first() else {
            ui::print_error("Usage: actions <post>");
            return Ok(());
        };
        let id = self.resolve_post(prefix)?;
        let actions = self.wrangler.offered_actions(self.user.id, id).await?;

        println!();
        if actions.is_empty() {
            ui::print_info("No actions are available for this post");
        } else {
            println!("{} {}:", "Actions for".bright_cyan().bold(), id.short().bright_yellow());
            for action in actions {
                println!("  • {}", action.label().bright_green());
            }
        }
        println!();
        Ok(())
    }

    async fn cmd_post(&self, args: &[&str]) -> Result<()> {
        if args.len() < 2 {
            ui::print_error("Usage: post <channel> <text>");
            return Ok(());
        }
        let channel = self.resolve_channel(args[0])?;
        let post = self
            .store
            .create_post(NewPost::ordinary(channel.id, self.user.id, args[1..].join(" ")))
            .await?;
        ui::print_success(&format!("Posted {} in ~{}", post.id.short(), channel.name));
        Ok(())
    }

    async fn cmd_reply(&self, args: &[&str]) -> Result<()> {
        if args.len() < 2 {
            ui::print_error("Usage: reply <post> <text>");
            return Ok(());
        }
        let target = self.store.get_post(self.resolve_post(args[0])?).await?;
        let request = NewPost::ordinary(target.channel_id, self.user.id, args[1..].join(" "))
            .in_thread(target.thread_root());
        let post = self.store.create_post(request).await?;
        ui::print_success(&format!(
            "Replied {} in thread {}",
            post.id.short(),
            target.thread_root().short()
        ));
        Ok(())
    }

    async fn cmd_relocate(&self, args: &[&str], is_move: bool) -> Result<()> {
        if args.len() < 2 {
            let verb = if is_move { "move" } else { "copy" };
            ui::print_error(&format!("Usage: {} <post> <channel>", verb));
            return Ok(());
        }
        let post = self.resolve_post(args[0])?;
        let channel = self.resolve_channel(args[1])?;

        let result = if is_move {
            self.wrangler.move_thread(self.user.id, post, channel.id).await
        } else {
            self.wrangler.copy_thread(self.user.id, post, channel.id).await
        };
        self.report_relocation(result)
    }

    async fn cmd_copy_to_channel(&self, args: &[&str]) -> Result<()> {
        let Some(prefix) = args.first() else {
            ui::print_error("Usage: copy-to-channel <post>");
            return Ok(());
        };
        let post = self.resolve_post(prefix)?;
        let result = self.wrangler.copy_to_channel(self.user.id, post).await;
        self.report_relocation(result)
    }

    async fn cmd_attach(&self, args: &[&str]) -> Result<()> {
        let (step, post) = match args {
            [step, prefix] => (*step, self.resolve_post(prefix)?),
            _ => {
                ui::print_error("Usage: attach start|finish <post>");
                return Ok(());
            }
        };

        match step {
            "start" => {
                let slot = self.wrangler.start_attach(self.user.id, post).await.map_err(hint)?;
                ui::print_success(&format!("Staged {}", describe_slot(&slot)));
                ui::print_info("Now run: attach finish <post in the target thread>");
            }
            "finish" => {
                let post = self.wrangler.finish_attach(self.user.id, post).await.map_err(hint)?;
                ui::print_success(&format!(
                    "Attached {} to thread {}",
                    post.id.short(),
                    post.thread_root().short()
                ));
            }
            other => ui::print_error(&format!("Unknown attach step: {}", other)),
        }
        Ok(())
    }

    async fn cmd_merge(&self, args: &[&str]) -> Result<()> {
        let (step, post) = match args {
            [step, prefix] => (*step, self.resolve_post(prefix)?),
            _ => {
                ui::print_error("Usage: merge start|finish <post>");
                return Ok(());
            }
        };

        match step {
            "start" => {
                let slot = self.wrangler.start_merge(self.user.id, post).await.map_err(hint)?;
                ui::print_success(&format!("Staged {}", describe_slot(&slot)));
                ui::print_info("Now run: merge finish <post in an older thread>");
            }
            "finish" => {
                let result = self.wrangler.finish_merge(self.user.id, post).await.map_err(hint)?;
                self.report_merge(&result);
            }
            other => ui::print_error(&format!("Unknown merge step: {}", other)),
        }
        Ok(())
    }

    fn cmd_staged(&self, args: &[&str]) -> Result<()> {
        if args.first() == Some(&"clear") {
            match self.wrangler.clear_staged(self.user.id) {
                Some(slot) => ui::print_success(&format!("Cleared {}", describe_slot(&slot))),
                None => ui::print_info("Nothing was staged"),
            }
            return Ok(());
        }

        match self.wrangler.peek_staged(self.user.id) {
            Some(slot) => {
                ui::print_info(&format!("Staged {}", describe_slot(&slot)));
                self.print_post(&slot.selection.post);
            }
            None => ui::print_info("Nothing is staged"),
        }
        Ok(())
    }

    fn cmd_expire(&self) -> Result<()> {
        if self.wrangler.config().staging_max_idle().is_none() {
            ui::print_info("No expiry policy configured (staging_max_idle_secs)");
            return Ok(());
        }
        let evicted = self.wrangler.expire_staged(now_millis());
        ui::print_success(&format!("Expired {} staged selection(s)", evicted.len()));
        Ok(())
    }

    fn report_relocation(&self, result: wrangler_core::Result<RelocationResult>) -> Result<()> {
        let result = result.map_err(hint)?;
        let destination = self.channel_name(result.destination_channel);

        ui::print_success(&format!(
            "{} thread with {} post(s) to ~{}; new root {}",
            capitalize(result.kind.verb()),
            result.len(),
            destination,
            result.new_root.short()
        ));
        if !result.retained_originals.is_empty() {
            ui::print_warning(&format!(
                "{} original post(s) could not be deleted and were kept",
                result.retained_originals.len()
            ));
        }
        Ok(())
    }

    fn report_merge(&self, result: &MergeResult) {
        ui::print_success(&format!(
            "Merged {} post(s) into thread {} in ~{}",
            result.reparented.len(),
            result.target_root.short(),
            self.channel_name(result.target_channel)
        ));
    }

    fn print_post(&self, post: &Post) {
        let author = self
            .store
            .users()
            .into_iter()
            .find(|u| u.id == post.author_id)
            .map(|u| format!("@{}", u.username))
            .unwrap_or_else(|| "unknown".to_string());
        ui::print_post(post, &author);
    }

    fn channel_name(&self, id: wrangler_core::ChannelId) -> String {
        self.store
            .channels()
            .into_iter()
            .find(|c| c.id == id)
            .map(|c| c.name)
            .unwrap_or_else(|| id.to_string())
    }

    fn resolve_channel(&self, name: &str) -> Result<Channel> {
        let name = name.trim_start_matches('~');
        self.store
            .channel_by_name(name)
            .with_context(|| format!("No channel named ~{}", name))
    }

    /// Full id or unique prefix of one
    fn resolve_post(&self, prefix: &str) -> Result<PostId> {
        if let Ok(id) = PostId::from_string(prefix) {
            return Ok(id);
        }

        let prefix = prefix.to_lowercase();
        let matches: Vec<PostId> = self
            .store
            .all_posts()
            .into_iter()
            .map(|p| p.id)
            .filter(|id| id.0.simple().to_string().starts_with(&prefix))
            .collect();

        match matches.as_slice() {
            [] => bail!("No post found with ID prefix: {}", prefix),
            [id] => Ok(*id),
            _ => bail!("{} posts match prefix {}; be more specific", matches.len(), prefix),
        }
    }
}

fn describe_slot(slot: &StagingSlot) -> String {
    format!(
        "{} of {} by @{} in ~{}",
        slot.kind,
        slot.selection.post.id.short(),
        slot.selection.author.username,
        slot.selection.channel.name
    )
}

/// Print a retry hint before handing the error to the REPL
fn hint(err: Error) -> anyhow::Error {
    if let Error::PartialFailure { created, .. } = &err {
        ui::print_warning(&format!(
            "{} post(s) were already created in the destination",
            created.len()
        ));
    }
    if err.is_retryable() {
        ui::print_info("The request can be retried once the cause is resolved");
    }
    err.into()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
