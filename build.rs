use std::env;
use std::process::Command;

/// Run a snippet with the Python interpreter pyo3 will build against
fn python_output(python: &str, snippet: &str) -> Option<String> {
    let output = Command::new(python).args(["-c", snippet]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text: String = String::from_utf8(output.stdout).ok()?;
    return Some(text.trim().to_string());
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PYO3_PYTHON");
    println!("cargo:rerun-if-env-changed=VIRTUAL_ENV");

    // SVD and the other LAPACK routines come from OpenBLAS
    #[cfg(windows)]
    {
        println!("cargo:rustc-link-lib=dylib=openblas");
        println!("cargo:rustc-link-lib=dylib=lapack");
    }

    // Unit tests are linked as executables, so they need libpython on the search path
    let profile: String = env::var("PROFILE").unwrap_or_default();
    if profile != "debug" && profile != "test" {
        return;
    }
    let python: String = match (env::var("PYO3_PYTHON"), env::var("VIRTUAL_ENV")) {
        (Ok(python), _) => python,
        (Err(_), Ok(virtual_env)) => format!("{}/bin/python", virtual_env),
        _ => "python3".to_string(),
    };

    if let Some(library_folder) = python_output(&python, "import sysconfig; print(sysconfig.get_config_var('LIBDIR'))") {
        println!("cargo:rustc-link-search=native={}", library_folder);
        if let Some(version) = python_output(&python, "import sys; print(f'{sys.version_info.major}.{sys.version_info.minor}')") {
            println!("cargo:rustc-link-lib=dylib=python{}", version);
        }
    }
}
