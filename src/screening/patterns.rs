/// Disallowed substring patterns for static screening
use serde::{Deserialize, Serialize};

/// Built-in screening list, checked in this order
pub const DEFAULT_PATTERNS: &[&str] = &[
    // System access
    "import subprocess",
    "import sys",
    "import shutil",
    "import tempfile",
    "import glob",
    "import fnmatch",
    "import pathlib",
    "import stat",
    "import pwd",
    "import grp",
    // Network access
    "import socket",
    "import urllib",
    "import urllib2",
    "import urllib3",
    "import http",
    "import requests",
    "import ftplib",
    "import smtplib",
    "import telnetlib",
    "import poplib",
    "import imaplib",
    "import nntplib",
    "import ssl",
    // Process/threading control
    "import ctypes",
    "import multiprocessing",
    "import threading",
    "import queue",
    "import mmap",
    // Dynamic evaluation and raw file access
    "__import__",
    "eval(",
    "exec(",
    "open(",
    "file(",
    "input(",
    "raw_input(",
    "compile(",
];

/// Immutable, ordered set of lowercased patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSet {
    patterns: Vec<String>,
}

impl PatternSet {
    /// Build a set from arbitrary patterns. Order is preserved; patterns are
    /// case-folded and blank entries dropped.
    pub fn new<'a, I>(patterns: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let patterns = patterns
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .map(str::to_lowercase)
            .collect();
        Self { patterns }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERNS.iter().copied())
    }
}
