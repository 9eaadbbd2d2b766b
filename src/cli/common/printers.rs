// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Pretty printers for reporting information.
use std::{borrow::Cow, sync::Mutex};

use log::Level;

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

lazy_static::lazy_static! {
    static ref WARNINGS: Mutex<Vec<Cow<'static, str>>> = Mutex::new(vec![]);
}

/// A titled tree of lines, logged at info level.
pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl InfoPrinter {
    pub(crate) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(crate) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(crate) fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    pub(crate) fn display(self) {
        print_tree(Level::Info, &self.title, &self.blocks);
    }
}

fn print_tree(level: Level, title: &str, blocks: &[Vec<Cow<'static, str>>]) {
    log::log!(level, "{}", console::style(title).bold());
    let num_blocks = blocks.len();
    for (i_block, block) in blocks.iter().enumerate() {
        let num_lines = block.len();
        for (i_line, line) in block.iter().enumerate() {
            let symbol = match (i_line, i_line + 1 == num_lines, i_block + 1 == num_blocks) {
                (0, false, _) => VERTICAL_AND_RIGHT,
                (0, _, false) => VERTICAL_AND_RIGHT,
                (0, true, true) => UP_AND_RIGHT,
                _ => VERTICAL,
            };
            log::log!(level, "{symbol} {line}");
        }
    }
    log::log!(level, "");
}

/// Queue a warning to be shown with [`display_warnings`].
pub(crate) trait Warn {
    fn warn(self);
}

impl<T: Into<Cow<'static, str>>> Warn for T {
    fn warn(self) {
        if let Ok(mut warnings) = WARNINGS.lock() {
            warnings.push(self.into());
        }
    }
}

/// Log all queued warnings, then forget them.
pub(crate) fn display_warnings() {
    log::debug!("Displaying warnings");
    let Ok(mut warnings) = WARNINGS.lock() else {
        return;
    };
    if warnings.is_empty() {
        return;
    }
    let blocks: Vec<Vec<Cow<'static, str>>> = warnings.drain(..).map(|w| vec![w]).collect();
    print_tree(Level::Warn, "Warnings", &blocks);
}
