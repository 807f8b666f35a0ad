//! In-memory test doubles for the backend and the operator.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;

use crate::backend::{CheckoutRequest, MergeRequest, VersionControl};
use crate::errors::BackendError;
use crate::workflow::{Operator, Prompt, Question, Report};

type Tree = BTreeMap<String, String>;

#[derive(Default)]
struct FakeState {
    refs: HashMap<String, Tree>,
    worktree: Tree,
    diff_order: Option<Vec<String>>,
    unmerged: Vec<String>,
    conflicts_on_merge: Vec<String>,
    failing_checkouts: Vec<String>,
    config: HashMap<String, String>,
    remotes: HashMap<String, String>,
    status: String,
    configure_calls: usize,
    fail_fetch: bool,
    fail_config: bool,
    calls: Vec<String>,
}

/// A backend over named in-memory trees. The `HEAD` tree seeds the working copy.
#[derive(Default)]
pub struct FakeBackend {
    state: RefCell<FakeState>,
}

fn failed(command: String, stderr: &str) -> BackendError {
    BackendError::CommandFailed {
        command,
        exit_code: 1,
        stderr: stderr.to_string(),
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ref(self, name: &str, files: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let tree: Tree = files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect();
            if name == "HEAD" {
                state.worktree = tree.clone();
            }
            state.refs.insert(name.to_string(), tree);
        }
        self
    }

    /// Report exactly these paths from `diff_paths`, in this order.
    pub fn with_diff_order(self, paths: &[&str]) -> Self {
        self.state.borrow_mut().diff_order = Some(paths.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn with_remote(self, name: &str, url: &str) -> Self {
        self.state
            .borrow_mut()
            .remotes
            .insert(name.to_string(), url.to_string());
        self
    }

    pub fn with_status(self, status: &str) -> Self {
        self.state.borrow_mut().status = status.to_string();
        self
    }

    /// Make checkouts of these exact pathspecs fail.
    pub fn with_failing_checkout(self, paths: &[&str]) -> Self {
        self.state.borrow_mut().failing_checkouts = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Make the next merge fail with these paths left unmerged.
    pub fn with_merge_conflicts(self, paths: &[&str]) -> Self {
        self.state.borrow_mut().conflicts_on_merge = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn fail_fetch(&self) {
        self.state.borrow_mut().fail_fetch = true;
    }

    pub fn fail_config(&self) {
        self.state.borrow_mut().fail_config = true;
    }

    pub fn worktree_file(&self, path: &str) -> Option<String> {
        self.state.borrow().worktree.get(path).cloned()
    }

    pub fn configure_calls(&self) -> usize {
        self.state.borrow().configure_calls
    }

    /// Mutating calls in order, e.g. `checkout upstream/main a.txt`.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    fn tree(&self, name: &str) -> Result<Tree, BackendError> {
        self.state
            .borrow()
            .refs
            .get(name)
            .cloned()
            .ok_or_else(|| failed(format!("rev-parse {}", name), "unknown revision"))
    }
}

impl VersionControl for FakeBackend {
    fn fetch(&self, remote: &str) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("fetch {}", remote));
        if state.fail_fetch || !state.remotes.contains_key(remote) {
            return Err(failed(format!("git fetch {}", remote), "could not read from remote"));
        }
        Ok(())
    }

    fn latest_commit(&self, reference: &str) -> Result<Option<String>, BackendError> {
        Ok(self
            .state
            .borrow()
            .refs
            .contains_key(reference)
            .then(|| format!("abc1234 tip of {}", reference)))
    }

    fn diff_paths(&self, from: &str, to: &str) -> Result<Vec<String>, BackendError> {
        if let Some(order) = &self.state.borrow().diff_order {
            return Ok(order.clone());
        }
        let (a, b) = (self.tree(from)?, self.tree(to)?);
        let mut paths: Vec<String> = a.keys().chain(b.keys()).cloned().collect();
        paths.sort();
        paths.dedup();
        paths.retain(|p| a.get(p) != b.get(p));
        Ok(paths)
    }

    fn diff_text(&self, from: &str, to: &str, path: &str) -> Result<String, BackendError> {
        let (a, b) = (self.tree(from)?, self.tree(to)?);
        let (old, new) = (a.get(path), b.get(path));
        if old == new {
            return Ok(String::new());
        }
        let mut patch = format!("--- a/{}\n+++ b/{}\n", path, path);
        if let Some(old) = old {
            patch.push_str(&format!("-{}\n", old));
        }
        if let Some(new) = new {
            patch.push_str(&format!("+{}\n", new));
        }
        Ok(patch)
    }

    fn merge(&self, request: &MergeRequest<'_>) -> Result<(), BackendError> {
        let incoming = self.tree(request.reference)?;
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("merge {}", request.reference));
        if !state.conflicts_on_merge.is_empty() {
            state.unmerged = std::mem::take(&mut state.conflicts_on_merge);
            return Err(failed(
                format!("git merge {}", request.reference),
                "Automatic merge failed; fix conflicts and then commit the result.",
            ));
        }
        // Takes every upstream file, protected or not, as a merge whose
        // driver was ignored would.
        for (path, content) in incoming {
            state.worktree.insert(path, content);
        }
        Ok(())
    }

    fn checkout(&self, request: &CheckoutRequest<'_>) -> Result<(), BackendError> {
        let source = self.tree(request.reference)?;
        let mut state = self.state.borrow_mut();
        state.calls.push(format!(
            "checkout {} {}",
            request.reference,
            request.paths.join(" ")
        ));
        for spec in request.paths {
            if state.failing_checkouts.iter().any(|p| p == spec) {
                return Err(failed(
                    format!("git checkout {} -- {}", request.reference, spec),
                    "unable to write file",
                ));
            }
            let prefix = format!("{}/", spec);
            let matched: Vec<(String, String)> = source
                .iter()
                .filter(|(path, _)| path.as_str() == *spec || path.starts_with(&prefix))
                .map(|(p, c)| (p.clone(), c.clone()))
                .collect();
            if matched.is_empty() {
                return Err(failed(
                    format!("git checkout {} -- {}", request.reference, spec),
                    "pathspec did not match any file(s) known to git",
                ));
            }
            state.worktree.extend(matched);
        }
        Ok(())
    }

    fn path_exists(&self, reference: &str, path: &str) -> Result<bool, BackendError> {
        Ok(self.tree(reference)?.contains_key(path))
    }

    fn remove(&self, paths: &[&str]) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("rm {}", paths.join(" ")));
        for path in paths {
            state.worktree.remove(*path);
        }
        Ok(())
    }

    fn list_unmerged(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.state.borrow().unmerged.clone())
    }

    fn status(&self) -> Result<String, BackendError> {
        let status = self.state.borrow().status.clone();
        Ok(if status.is_empty() {
            "On branch main\nnothing to commit, working tree clean".into()
        } else {
            status
        })
    }

    fn config_value(&self, key: &str) -> Result<Option<String>, BackendError> {
        let state = self.state.borrow();
        if state.fail_config {
            return Err(failed("git config".into(), "could not lock config file"));
        }
        Ok(state.config.get(key).cloned())
    }

    fn configure(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        if state.fail_config {
            return Err(failed("git config".into(), "could not lock config file"));
        }
        state.configure_calls += 1;
        state.config.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remote_url(&self, name: &str) -> Result<Option<String>, BackendError> {
        Ok(self.state.borrow().remotes.get(name).cloned())
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("remote add {} {}", name, url));
        state.remotes.insert(name.to_string(), url.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// An operator replaying canned answers and recording what it was shown.
///
/// Running out of answers behaves like a closed terminal.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<String>,
    confirmations: VecDeque<bool>,
    pub reports: Vec<&'static str>,
    pub prompts: Vec<&'static str>,
    pub opened: Vec<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new(answers: &[&str], confirmations: &[bool]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            confirmations: confirmations.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn saw(&self, label: &str) -> bool {
        self.reports.iter().any(|r| *r == label)
    }

    pub fn count(&self, label: &str) -> usize {
        self.reports.iter().filter(|r| **r == label).count()
    }
}

impl Operator for ScriptedOperator {
    fn report(&mut self, report: Report<'_>) {
        self.reports.push(report.label());
    }

    fn ask(&mut self, prompt: Prompt) -> io::Result<String> {
        self.prompts.push(prompt.label());
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }

    fn confirm(&mut self, question: Question<'_>) -> io::Result<bool> {
        self.prompts.push(question.label());
        self.confirmations
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }

    fn open_in_editor(&mut self, paths: &[String]) -> io::Result<()> {
        self.opened.push(paths.to_vec());
        Ok(())
    }
}
