//! UI utilities for pretty printing

use colored::Colorize;
use wrangler_core::{format_timestamp, MessageType, Post};

pub fn print_help() {
    println!();
    println!("{}", "Available Commands:".bright_cyan().bold());
    println!();
    println!("  {:<34} {}", "help".bright_green(), "Show this help message");
    println!("  {:<34} {}", "quit, exit".bright_green(), "Exit the application");
    println!();
    println!("  {}", "Browsing:".bright_yellow().bold());
    println!("  {:<34} {}", "channels".bright_green(), "List channels");
    println!("  {:<34} {}", "users".bright_green(), "List users");
    println!("  {:<34} {}", "posts <channel>".bright_green(), "Show threads in a channel");
    println!("  {:<34} {}", "thread <post>".bright_green(), "Show the thread containing a post");
    println!("  {:<34} {}", "actions <post>".bright_green(), "Actions available on a post");
    println!();
    println!("  {}", "Writing:".bright_yellow().bold());
    println!("  {:<34} {}", "post <channel> <text>".bright_green(), "Start a new thread");
    println!("  {:<34} {}", "reply <post> <text>".bright_green(), "Reply in a thread");
    println!();
    println!("  {}", "Relocation:".bright_yellow().bold());
    println!(
        "  {:<34} {}",
        "move <post> <channel>".bright_green(),
        "Move a thread to another channel"
    );
    println!(
        "  {:<34} {}",
        "copy <post> <channel>".bright_green(),
        "Copy a thread to another channel"
    );
    println!(
        "  {:<34} {}",
        "copy-to-channel <post>".bright_green(),
        "Copy a thread to the configured channel"
    );
    println!(
        "  {:<34} {}",
        "attach start|finish <post>".bright_green(),
        "Attach a message to a thread"
    );
    println!(
        "  {:<34} {}",
        "merge start|finish <post>".bright_green(),
        "Merge a thread into an older one"
    );
    println!("  {:<34} {}", "staged [clear]".bright_green(), "Show or clear your staged selection");
    println!("  {:<34} {}", "expire".bright_green(), "Drop idle staged selections");
    println!();
    println!("  {}", "Info:".bright_yellow().bold());
    println!("  {:<34} {}", "as <user>".bright_green(), "Act as another user");
    println!("  {:<34} {}", "whoami".bright_green(), "Show the acting user");
    println!("  {:<34} {}", "version".bright_green(), "Show version and build info");
    println!();
    println!("  {}", "Post ids may be shortened to any unique prefix.".bright_black());
    println!();
}

/// One line per post; replies are indented under their root
pub fn print_post(post: &Post, author: &str) {
    let indent = if post.is_root() { "" } else { "    ↳ " };
    let time = format_timestamp(post.created_at);
    let body = match post.message_type {
        MessageType::Ordinary => post.message.normal(),
        _ => post.message.bright_black().italic(),
    };
    println!(
        "  {}{} {} {}: {}",
        indent,
        post.id.short().bright_yellow(),
        time.bright_black(),
        author.bright_cyan(),
        body
    );
}

pub fn print_error(msg: &str) {
    println!("{} {}", "✗".bright_red(), msg.red());
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".bright_green(), msg.bright_green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".bright_blue(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".bright_yellow(), msg.yellow());
}
