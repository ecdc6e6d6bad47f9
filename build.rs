use std::env;
use std::process::Command;

fn main() {
    if let Ok(target) = env::var("TARGET") {
        println!("cargo:rustc-env=TARGET={target}");
    }

    println!("cargo:rerun-if-env-changed=BUILD_REV");
    let rev = match env::var("BUILD_REV") {
        Ok(rev) => Some(rev),
        Err(_) => match get_git_rev() {
            Ok(rev) => Some(rev),
            Err(err) => {
                eprintln!("Failed to get git revision: {}", err);
                None
            }
        },
    };
    if let Some(rev) = rev {
        println!("cargo:rustc-env=BUILD_REV={}", rev.trim());
    }
}

fn get_git_rev() -> Result<String, Box<dyn std::error::Error>> {
    let output = Command::new("git")
        .arg("rev-parse")
        .arg("--short")
        .arg("HEAD")
        .output()?;
    if !output.status.success() {
        return Err("not a git repository".into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
