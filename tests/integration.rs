use std::{fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let params_path = test_dir.join("params.toml");
    let params_contents = String::new()
        + "[model]\n"
        + "grid_side = 12\n"
        + "mean_dwell_exp = 2.0\n"
        + "mean_dwell_inf = 4.0\n"
        + "mean_dwell_rem = 40.0\n"
        + "inf_force = 0.5\n"
        + "\n"
        + "[init]\n"
        + "n_agents = 400\n"
        + "n_susceptible = 380\n"
        + "n_exposed = 0\n"
        + "n_infectious = 20\n"
        + "n_removed = 0\n";

    fs::write(&params_path, params_contents).expect("failed to write params file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_contagium"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let path_str = |file: &PathBuf| file.to_str().expect("path is not valid UTF-8").to_string();

    let params = path_str(&params_path);
    let rep_0 = test_dir.join("trajectory-0000.csv");
    let rep_1 = test_dir.join("trajectory-0001.csv");
    let repeat = test_dir.join("repeat.csv");

    let out_0 = path_str(&rep_0);
    let out_1 = path_str(&rep_1);
    let out_repeat = path_str(&repeat);

    run_bin(&["run", "--seed", "7", "--days", "60", "--params", &params, "--out", &out_0]);
    run_bin(&[
        "run", "--seed", "7", "--days", "60", "--params", &params, "--out", &out_repeat,
    ]);
    run_bin(&["run", "--seed", "8", "--days", "60", "--params", &params, "--out", &out_1]);

    // identical seeds must reproduce the table byte for byte
    let bytes_a = fs::read(&rep_0).expect("failed to read first trajectory");
    let bytes_b = fs::read(&repeat).expect("failed to read repeated trajectory");
    assert_eq!(bytes_a, bytes_b, "same-seed runs diverged");

    // schema, contiguous days, and conservation on every row
    let table = String::from_utf8(bytes_a).expect("trajectory is not valid UTF-8");
    let mut lines = table.lines();
    assert_eq!(lines.next(), Some("t,S,E,I,R"));

    let mut n_rows = 0;
    for (i_row, line) in lines.enumerate() {
        let fields: Vec<u32> = line
            .split(',')
            .map(|field| field.parse().expect("non-numeric field"))
            .collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0] as usize, i_row);
        assert_eq!(fields[1] + fields[2] + fields[3] + fields[4], 400);
        n_rows += 1;
    }
    assert_eq!(n_rows, 61, "expected the day-0 snapshot plus 60 days");

    run_bin(&["analyze", "--data-dir", test_dir.to_str().unwrap()]);

    let mean = fs::read_to_string(test_dir.join("mean-trajectory.csv"))
        .expect("failed to read mean trajectory");
    assert_eq!(mean.lines().next(), Some("t,S_mean,E_mean,I_mean,R_mean"));
    assert_eq!(mean.lines().count(), 62);

    let peaks = fs::read_to_string(test_dir.join("peaks.csv")).expect("failed to read peaks");
    assert_eq!(peaks.lines().next(), Some("rep,day_peak,peak_I"));
    // the repeat file does not match the trajectory-*.csv pattern
    assert_eq!(peaks.lines().count(), 3);

    fs::remove_dir_all(&test_dir).ok();
}
