//! `doctor` subcommand (spec §4.J): checks that the event-store and
//! artifact-store roots are writable and that at least one provider is
//! configured, the same shape as the teacher's `cli/doctor.rs`.

use evoagent_domain::config::Config;

/// Run every check and print a summary. Returns `true` when everything
/// passed.
pub fn run(config: &Config) -> bool {
    println!("evoagent-gateway doctor");
    println!("=======================\n");

    let mut all_passed = true;

    check_dir_writable("event store root", &config.events.state_root, &mut all_passed);
    check_dir_writable("artifact root", &config.artifacts.artifact_root, &mut all_passed);
    check_dir_writable(
        "source cache root",
        &config.artifacts.source_cache_root,
        &mut all_passed,
    );
    check_providers(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }
    all_passed
}

fn check_dir_writable(label: &str, path: &str, all_passed: &mut bool) {
    match std::fs::create_dir_all(path) {
        Ok(()) => print_check(label, true, path.to_string()),
        Err(e) => {
            print_check(label, false, format!("{path}: {e}"));
            *all_passed = false;
        }
    }
}

fn check_providers(config: &Config, all_passed: &mut bool) {
    // The mock provider is always available, so this only warns when no
    // *real* provider is configured; it never fails the run outright.
    let configured = config.llm.providers.len();
    if configured == 0 {
        print_check(
            "LLM providers configured",
            true,
            "none configured; gateway will run on the mock provider only".into(),
        );
    } else {
        print_check("LLM providers configured", true, format!("{configured} configured"));
    }
    let _ = all_passed;
}

fn print_check(label: &str, passed: bool, detail: String) {
    let mark = if passed { "ok" } else { "FAIL" };
    println!("  [{mark}] {label}: {detail}");
}
