use crate::output::is_quiet;
use crate::ui::theme::{theme, Role};
use crate::ui::Icons;

pub fn banner(title: &str, subtitle: &str) {
    if is_quiet() {
        return;
    }
    let theme = theme();
    println!();
    println!("{} {}", Icons::PLATE, theme.paint(Role::Title, title));
    println!("   {}", theme.paint(Role::Muted, subtitle));
    println!();
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, theme().paint(Role::Done, label));
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", theme().paint(Role::Heading, title));
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", theme().paint(Role::Label, label), value);
}
