//! The external `ipvsctl` helper invocation (§4.4, §6), abstracted behind a
//! trait so the applier's tests don't need a real binary on `PATH`.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Applies a rendered IPVS document. Mirrors `<ipvsctlPath> apply` (stdin)
/// and `<ipvsctlPath> apply -f <file>` (§6 "ipvsctl invocation").
#[async_trait]
pub trait IpvsCtl: Send + Sync {
    /// `ipvsctl apply`, piping `yaml` on stdin.
    async fn apply_stdin(&self, ipvsctl_path: &str, yaml: &str) -> std::io::Result<()>;

    /// `ipvsctl apply -f <path>`.
    async fn apply_file(&self, ipvsctl_path: &str, path: &Path) -> std::io::Result<()>;
}

/// The real implementation: shells out via `tokio::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessIpvsCtl;

#[async_trait]
impl IpvsCtl for ProcessIpvsCtl {
    async fn apply_stdin(&self, ipvsctl_path: &str, yaml: &str) -> std::io::Result<()> {
        let mut child = Command::new(ipvsctl_path)
            .arg("apply")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(yaml.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        check_status(output.status, &output.stderr)
    }

    async fn apply_file(&self, ipvsctl_path: &str, path: &Path) -> std::io::Result<()> {
        let output = Command::new(ipvsctl_path)
            .arg("apply")
            .arg("-f")
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;
        check_status(output.status, &output.stderr)
    }
}

#[async_trait]
impl<T: IpvsCtl + ?Sized> IpvsCtl for Arc<T> {
    async fn apply_stdin(&self, ipvsctl_path: &str, yaml: &str) -> std::io::Result<()> {
        (**self).apply_stdin(ipvsctl_path, yaml).await
    }

    async fn apply_file(&self, ipvsctl_path: &str, path: &Path) -> std::io::Result<()> {
        (**self).apply_file(ipvsctl_path, path).await
    }
}

fn check_status(status: std::process::ExitStatus, stderr: &[u8]) -> std::io::Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!(
            "ipvsctl exited with {status}: {}",
            String::from_utf8_lossy(stderr)
        )))
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::sync::Mutex;

    /// Records every invocation; can be told to fail the next N calls.
    #[derive(Default)]
    pub struct FakeIpvsCtl {
        pub calls: Mutex<Vec<String>>,
        pub fail_next: Mutex<u32>,
    }

    #[async_trait]
    impl IpvsCtl for FakeIpvsCtl {
        async fn apply_stdin(&self, _ipvsctl_path: &str, yaml: &str) -> std::io::Result<()> {
            self.calls.lock().unwrap().push(yaml.to_string());
            self.maybe_fail()
        }

        async fn apply_file(&self, _ipvsctl_path: &str, path: &Path) -> std::io::Result<()> {
            self.calls.lock().unwrap().push(path.display().to_string());
            self.maybe_fail()
        }
    }

    impl FakeIpvsCtl {
        fn maybe_fail(&self) -> std::io::Result<()> {
            let mut fail_next = self.fail_next.lock().unwrap();
            if *fail_next > 0 {
                *fail_next -= 1;
                Err(std::io::Error::other("synthetic failure"))
            } else {
                Ok(())
            }
        }
    }
}
