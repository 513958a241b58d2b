pub mod analyze;
pub mod data;
pub mod discover;
pub mod scan;
pub mod stream;

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
  __  ____  __ _       _   _
  \ \/ /  \/  | |     | \ | | _____  ___   _ ___
   \  /| |\/| | |     |  \| |/ _ \ \/ / | | / __|
   /  \| |  | | |___  | |\  |  __/>  <| |_| \__ \
  /_/\_\_|  |_|_____| |_| \_|\___/_/\_\\__,_|___/
"#;
    println!("{}", banner.bright_cyan());
    println!(
        "  {} v{}\n",
        "sitemap hierarchy scanner".bright_white(),
        env!("CARGO_PKG_VERSION")
    );
}
