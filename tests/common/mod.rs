//! Common test utilities and helpers

#![allow(dead_code)]

use crawlwatch::config::{CommandConfig, SupervisorConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary installation: an output directory and a crawler working dir
pub struct TestContext {
    pub temp_dir: TempDir,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let output_dir = temp_dir.path().join("crawl-output");
        let work_dir = temp_dir.path().join("work");
        std::fs::create_dir_all(&work_dir).expect("work dir");
        Self {
            temp_dir,
            output_dir,
            work_dir,
        }
    }

    /// Config whose crawler is `sh -c <script>` run inside `work_dir`
    pub fn sh_config(&self, script: &str) -> SupervisorConfig {
        SupervisorConfig {
            output_dir: self.output_dir.clone(),
            command: CommandConfig {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
                working_dir: Some(self.work_dir.clone()),
                env: HashMap::new(),
            },
            ..SupervisorConfig::default()
        }
    }

    pub fn write_work_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.work_dir.join(name);
        std::fs::write(&path, content).expect("write work file");
        path
    }

    pub fn output_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(relative)
    }
}

/// Shell script printing the ten-unit crawl: six successes, three failures
/// and one unit that never reports. Some lines are split across writes.
pub fn ten_unit_script() -> String {
    let mut script = String::from("printf '[步骤1] 开始爬取课程，共10个课程ID\\n'\n");
    for id in 1..=10 {
        script.push_str(&format!("printf '正在处理 '; sleep 0.01; printf 'id:{}\\n'\n", id));
        match id {
            1..=6 => script.push_str(&format!(
                "printf '[{}]:课程{} 提取视频'; printf '链接成功\\n'\n",
                id, id
            )),
            7..=9 => script.push_str(&format!(
                "printf '\\033[31m[{}]:课程{} 提取视频链接失败\\033[0m\\n'\n",
                id, id
            )),
            _ => script.push_str("printf '请求超时，等待中...\\n'\n"),
        }
    }
    script
}
