//! In-memory modal editor
//!
//! Implements the slice of Neovim behaviour the bridge relies on: named
//! buffers loaded from disk, Ex line addresses and `/` searches, a handful of
//! normal-mode motions, insert mode, and the buffer API.

use std::fs;
use std::path::{Path, PathBuf};

use libvimbridge_core::translate::normalize_path;
use regex::Regex;

const ESC: char = '\x1b';

/// Editor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Insert,
    Command,
}

impl Mode {
    /// Short mode name as reported by `nvim_get_mode`
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "n",
            Mode::Insert => "i",
            Mode::Command => "c",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeBuffer {
    pub handle: u64,
    /// Absolute path, or empty for an unnamed buffer
    pub name: String,
    pub lines: Vec<String>,
    pub modified: bool,
}

/// Cursor: 0-based row, 0-based byte column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

pub struct FakeEditor {
    cwd: PathBuf,
    buffers: Vec<FakeBuffer>,
    current: usize,
    cursor: Pos,
    mode: Mode,
    pending: String,
    cmdline: String,
    next_handle: u64,
    /// Last error raised while executing typed keys (`v:errmsg`)
    errmsg: String,
    /// Every command received, in order: `:ex`, raw keys, or `set_lines`
    pub history: Vec<String>,
}

impl FakeEditor {
    /// Editor with one empty unnamed buffer; relative paths resolve in `cwd`
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            buffers: vec![FakeBuffer {
                handle: 1,
                name: String::new(),
                lines: vec![String::new()],
                modified: false,
            }],
            current: 0,
            cursor: Pos::default(),
            mode: Mode::Normal,
            pending: String::new(),
            cmdline: String::new(),
            next_handle: 2,
            errmsg: String::new(),
            history: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cursor(&self) -> Pos {
        self.cursor
    }

    pub fn current_buffer(&self) -> &FakeBuffer {
        &self.buffers[self.current]
    }

    pub fn buffers(&self) -> &[FakeBuffer] {
        &self.buffers
    }

    pub fn buffer(&self, handle: u64) -> Option<&FakeBuffer> {
        self.buffers.iter().find(|b| b.handle == handle)
    }

    /// Lines of the buffer named `path`
    pub fn lines_of(&self, path: &Path) -> Option<&[String]> {
        let name = self.absolute(path);
        self.buffers
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.lines.as_slice())
    }

    /// Buffer name for `path`: absolute with `.` and `..` removed
    fn absolute(&self, path: &Path) -> String {
        let path = if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.cwd.join(path))
        };
        path.to_string_lossy().into_owned()
    }

    /// Read a `v:` variable; only `errmsg` is modelled
    pub fn vvar(&self, name: &str) -> Result<String, String> {
        match name {
            "errmsg" => Ok(self.errmsg.clone()),
            other => Err(format!("Key not found: {}", other)),
        }
    }

    pub fn set_vvar(&mut self, name: &str, value: &str) -> Result<(), String> {
        match name {
            "errmsg" => {
                self.errmsg = value.to_string();
                Ok(())
            }
            other => Err(format!("Key not found: {}", other)),
        }
    }

    fn lines(&self) -> &Vec<String> {
        &self.buffers[self.current].lines
    }

    fn lines_mut(&mut self) -> &mut Vec<String> {
        let buffer = &mut self.buffers[self.current];
        buffer.modified = true;
        &mut buffer.lines
    }

    // Ex commands

    /// Execute one Ex command line; returns captured output
    pub fn exec(&mut self, command: &str) -> Result<String, String> {
        self.history.push(format!(":{}", command));
        self.run_ex(command)
    }

    fn run_ex(&mut self, command: &str) -> Result<String, String> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(String::new());
        }
        if let Some(pattern) = command.strip_prefix('/') {
            return self.search(pattern).map(|_| String::new());
        }
        if command == "$" {
            self.goto_row(self.lines().len().saturating_sub(1));
            return Ok(String::new());
        }
        if let Ok(line) = command.parse::<usize>() {
            self.goto_row(line.saturating_sub(1));
            return Ok(String::new());
        }

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match name {
            "e" | "edit" if !arg.is_empty() => {
                self.edit(&unescape(arg))?;
                Ok(String::new())
            }
            "enew" => {
                self.enew();
                Ok(String::new())
            }
            "w" | "write" => self.write(if arg.is_empty() { None } else { Some(unescape(arg)) }),
            "normal" | "normal!" => {
                self.feed(arg);
                Ok(String::new())
            }
            "set" => Ok(String::new()),
            "echo" if arg == "line(\".\")" => Ok((self.cursor.row + 1).to_string()),
            _ => Err(format!("E492: Not an editor command: {}", command)),
        }
    }

    fn edit(&mut self, path: &str) -> Result<(), String> {
        let name = self.absolute(Path::new(path));
        if let Some(idx) = self.buffers.iter().position(|b| b.name == name) {
            self.current = idx;
        } else {
            let lines = match fs::read_to_string(&name) {
                Ok(content) if !content.is_empty() => content.lines().map(String::from).collect(),
                _ => vec![String::new()],
            };
            self.buffers.push(FakeBuffer {
                handle: self.next_handle,
                name,
                lines,
                modified: false,
            });
            self.next_handle += 1;
            self.current = self.buffers.len() - 1;
        }
        self.cursor = Pos::default();
        self.mode = Mode::Normal;
        Ok(())
    }

    fn enew(&mut self) {
        self.buffers.push(FakeBuffer {
            handle: self.next_handle,
            name: String::new(),
            lines: vec![String::new()],
            modified: false,
        });
        self.next_handle += 1;
        self.current = self.buffers.len() - 1;
        self.cursor = Pos::default();
    }

    fn write(&mut self, target: Option<String>) -> Result<String, String> {
        let name = match target {
            Some(path) => {
                let name = self.absolute(Path::new(&path));
                if self.buffers[self.current].name.is_empty() {
                    self.buffers[self.current].name = name.clone();
                }
                name
            }
            None if self.buffers[self.current].name.is_empty() => {
                return Err("E32: No file name".to_string())
            }
            None => self.buffers[self.current].name.clone(),
        };

        let lines = self.lines();
        let content = if lines.len() == 1 && lines[0].is_empty() {
            String::new()
        } else {
            let mut content = lines.join("\n");
            content.push('\n');
            content
        };
        fs::write(&name, &content).map_err(|e| format!("E212: Can't open file for writing: {}", e))?;
        self.buffers[self.current].modified = false;
        Ok(format!("\"{}\" {}L, {}B written", name, self.lines().len(), content.len()))
    }

    fn goto_row(&mut self, row: usize) {
        let last = self.lines().len().saturating_sub(1);
        self.cursor.row = row.min(last);
        self.cursor.col = first_non_blank(&self.lines()[self.cursor.row]);
    }

    /// Forward search from the line after the cursor, wrapping around
    fn search(&mut self, pattern: &str) -> Result<(), String> {
        let regex = vim_regex(pattern).map_err(|e| format!("E383: Invalid search string: {}", e))?;
        let count = self.lines().len();
        let found = (1..=count)
            .map(|offset| (self.cursor.row + offset) % count)
            .find(|&row| regex.is_match(&self.lines()[row]));
        match found {
            Some(row) => {
                self.goto_row(row);
                Ok(())
            }
            None => Err(format!("E486: Pattern not found: {}", pattern)),
        }
    }

    // Keys

    /// Feed keys as if typed (`nvim_feedkeys` with mode `nx`)
    pub fn feedkeys(&mut self, keys: &str) {
        self.history.push(keys.to_string());
        self.feed(keys);
    }

    fn feed(&mut self, keys: &str) {
        for ch in keys.chars() {
            match self.mode {
                Mode::Normal => self.normal_key(ch),
                Mode::Insert => self.insert_key(ch),
                Mode::Command => self.cmdline_key(ch),
            }
        }
        // Typeahead ran out: pending insert or command line is abandoned
        if self.mode != Mode::Normal {
            self.mode = Mode::Normal;
            self.cmdline.clear();
        }
        self.pending.clear();
    }

    fn normal_key(&mut self, ch: char) {
        if !self.pending.is_empty() {
            let op = std::mem::take(&mut self.pending);
            match (op.as_str(), ch) {
                ("g", 'g') => self.goto_row(0),
                ("d", 'd') => self.delete_line(),
                _ => {}
            }
            return;
        }
        let len = self.lines()[self.cursor.row].len();
        match ch {
            'i' => self.mode = Mode::Insert,
            'a' => {
                self.cursor.col = (self.cursor.col + 1).min(len);
                self.mode = Mode::Insert;
            }
            'A' => {
                self.cursor.col = len;
                self.mode = Mode::Insert;
            }
            'I' => {
                self.cursor.col = first_non_blank(&self.lines()[self.cursor.row]);
                self.mode = Mode::Insert;
            }
            'o' => {
                let row = self.cursor.row + 1;
                self.lines_mut().insert(row, String::new());
                self.cursor = Pos { row, col: 0 };
                self.mode = Mode::Insert;
            }
            'O' => {
                let row = self.cursor.row;
                self.lines_mut().insert(row, String::new());
                self.cursor = Pos { row, col: 0 };
                self.mode = Mode::Insert;
            }
            '0' => self.cursor.col = 0,
            '$' => self.cursor.col = len.saturating_sub(1),
            'j' => self.goto_row(self.cursor.row + 1),
            'k' => self.goto_row(self.cursor.row.saturating_sub(1)),
            'G' => self.goto_row(usize::MAX),
            'x' if len > 0 => {
                let Pos { row, col } = self.cursor;
                self.lines_mut()[row].remove(col.min(len - 1));
                let len = self.lines()[row].len();
                self.cursor.col = col.min(len.saturating_sub(1));
            }
            'g' | 'd' => self.pending.push(ch),
            ':' => {
                self.mode = Mode::Command;
                self.cmdline.clear();
            }
            '/' => {
                self.mode = Mode::Command;
                self.cmdline = "/".to_string();
            }
            _ => {}
        }
    }

    fn delete_line(&mut self) {
        let row = self.cursor.row;
        let lines = self.lines_mut();
        lines.remove(row);
        if lines.is_empty() {
            lines.push(String::new());
        }
        self.goto_row(row);
    }

    fn insert_key(&mut self, ch: char) {
        let Pos { row, col } = self.cursor;
        match ch {
            ESC => {
                self.mode = Mode::Normal;
                self.cursor.col = col.saturating_sub(1);
            }
            '\r' | '\n' => {
                let rest = self.lines_mut()[row].split_off(col);
                self.lines_mut().insert(row + 1, rest);
                self.cursor = Pos { row: row + 1, col: 0 };
            }
            '\x08' => {
                if col > 0 {
                    self.lines_mut()[row].remove(col - 1);
                    self.cursor.col -= 1;
                }
            }
            ch => {
                self.lines_mut()[row].insert(col, ch);
                self.cursor.col += ch.len_utf8();
            }
        }
    }

    fn cmdline_key(&mut self, ch: char) {
        match ch {
            ESC => {
                self.mode = Mode::Normal;
                self.cmdline.clear();
            }
            '\r' | '\n' => {
                self.mode = Mode::Normal;
                let command = std::mem::take(&mut self.cmdline);
                // Typed commands report errors through v:errmsg only
                if let Err(message) = self.run_ex(&command) {
                    self.errmsg = message;
                }
            }
            ch => self.cmdline.push(ch),
        }
    }

    // Buffer API

    /// `nvim_buf_set_lines` with non-strict indexing; `end` of -1 means the
    /// end of the buffer. Handle 0 is the current buffer.
    pub fn set_lines(&mut self, handle: u64, start: i64, end: i64, replacement: Vec<String>) -> Result<(), String> {
        self.history.push("set_lines".to_string());
        let idx = self.buffer_index(handle)?;
        let lines = &mut self.buffers[idx].lines;
        let len = lines.len() as i64;
        let resolve = |i: i64| -> usize {
            let i = if i < 0 { len + 1 + i } else { i };
            i.clamp(0, len) as usize
        };
        let (start, end) = (resolve(start), resolve(end));
        if start > end {
            return Err("Index out of bounds".to_string());
        }
        lines.splice(start..end, replacement);
        if lines.is_empty() {
            lines.push(String::new());
        }
        self.buffers[idx].modified = true;
        if idx == self.current {
            let last = self.lines().len() - 1;
            self.cursor.row = self.cursor.row.min(last);
        }
        Ok(())
    }

    pub fn get_lines(&self, handle: u64, start: i64, end: i64) -> Result<Vec<String>, String> {
        let idx = self.buffer_index(handle)?;
        let lines = &self.buffers[idx].lines;
        let len = lines.len() as i64;
        let resolve = |i: i64| -> usize {
            let i = if i < 0 { len + 1 + i } else { i };
            i.clamp(0, len) as usize
        };
        let (start, end) = (resolve(start), resolve(end));
        Ok(lines[start..end.max(start)].to_vec())
    }

    pub fn buffer_index(&self, handle: u64) -> Result<usize, String> {
        if handle == 0 {
            return Ok(self.current);
        }
        self.buffers
            .iter()
            .position(|b| b.handle == handle)
            .ok_or_else(|| format!("Invalid buffer id: {}", handle))
    }
}

fn first_non_blank(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Remove Ex argument escaping
fn unescape(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut chars = arg.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Translate an editor search pattern (magic or very-magic) into a regex
pub fn vim_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let (very_magic, body) = match pattern.strip_prefix("\\v") {
        Some(body) => (true, body),
        None => (false, pattern),
    };

    let mut out = String::with_capacity(body.len() * 2);
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            let Some(next) = chars.next() else {
                out.push_str("\\\\");
                break;
            };
            match next {
                '<' | '>' if !very_magic => out.push_str("\\b"),
                '(' | ')' | '|' | '+' | '?' if !very_magic => out.push(next),
                '=' if !very_magic => out.push('?'),
                's' | 'S' | 'd' | 'D' | 'w' | 'W' => {
                    out.push('\\');
                    out.push(next);
                }
                't' => out.push_str("\\t"),
                other => out.push_str(&regex::escape(&other.to_string())),
            }
            continue;
        }
        match ch {
            '<' | '>' if very_magic => out.push_str("\\b"),
            '(' | ')' | '|' | '+' | '?' | '{' | '}' if !very_magic => {
                out.push_str(&regex::escape(&ch.to_string()))
            }
            '=' if very_magic => out.push('?'),
            ch => out.push(ch),
        }
    }
    Regex::new(&out)
}
