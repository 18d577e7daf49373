// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fork::Child;
use crate::launch::OutputPolicy;

/// Which of the child's streams a line came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Forwards captured output of child processes to the log.
///
/// Rules:
///  - only takes the streams of processes launched with the `log` output policy
///  - stdout lines are logged at info, stderr lines at warn
#[derive(Debug)]
pub struct Logger;

impl Logger {
    /// Takes the piped stdout and stderr of `child`, if any, and forwards them
    pub fn attach(child: &mut Child) -> Vec<JoinHandle<usize>> {
        let mut tasks = Vec::with_capacity(2);
        if child.output != OutputPolicy::Log {
            return tasks;
        }

        if let Some(stdout) = child.child.stdout.take() {
            tasks.push(tokio::spawn(Self::forward(
                child.name.clone(),
                Stream::Stdout,
                stdout,
            )));
        }

        if let Some(stderr) = child.child.stderr.take() {
            tasks.push(tokio::spawn(Self::forward(
                child.name.clone(),
                Stream::Stderr,
                stderr,
            )));
        }

        tasks
    }

    /// Logs every line until the stream closes, returns the number of lines seen
    pub async fn forward<R>(name: String, stream: Stream, reader: R) -> usize
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        let mut count = 0;

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    count += 1;
                    match stream {
                        Stream::Stdout => info!(process = %name, "{}", line),
                        Stream::Stderr => warn!(process = %name, "{}", line),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(process = %name, error = %e, "failed to read output");
                    break;
                }
            }
        }

        debug!(process = %name, ?stream, lines = count, "output closed");
        count
    }
}

#[cfg(test)]
mod tests {
    use std::process::Stdio;

    use tokio::process::Command;

    use super::*;

    fn piped(output: OutputPolicy) -> Child {
        let child = Command::new("true")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        Child {
            name: "hdmap_server".to_string(),
            output,
            child,
        }
    }

    #[tokio::test]
    async fn test_attach_log_policy() {
        let mut child = piped(OutputPolicy::Log);

        let tasks = Logger::attach(&mut child);
        assert_eq!(tasks.len(), 2);
        assert!(child.child.stdout.is_none());

        child.child.wait().await.unwrap();
        for task in tasks {
            assert_eq!(task.await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_attach_skips_screen_policy() {
        let mut child = piped(OutputPolicy::Screen);

        assert!(Logger::attach(&mut child).is_empty());
        assert!(child.child.stdout.is_some());
        assert!(child.child.stderr.is_some());

        child.child.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_forward_counts_lines() {
        let input: &[u8] = b"map loaded\nserving 12 lanes\n";

        let count = Logger::forward("hdmap_server".to_string(), Stream::Stdout, input).await;
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_forward_unterminated_line() {
        let input: &[u8] = b"warning: no map\nlast";

        let count = Logger::forward("hdmap_server".to_string(), Stream::Stderr, input).await;
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_forward_empty() {
        let input: &[u8] = b"";

        assert_eq!(Logger::forward("rviz2".to_string(), Stream::Stdout, input).await, 0);
    }
}
