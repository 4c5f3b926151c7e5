/*
 * aurpkg - A small AUR search, fetch and build helper.
 * Copyright (C) 2025  aurpkg contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Interactive package selection.
//!
//! The user answers the prompt with numbers such as `1 2 3`. Parsing and
//! acquisition are interleaved: each confirmed number is handed to the
//! caller before the next one is read, so a bad number later in the line
//! never undoes an earlier build. Only an unusable *first* number aborts
//! the whole selection.

use std::io::{self, BufRead};
use tracing::debug;

use super::search::PackageSummary;
use crate::error::AurResult;

/// Bytes read from the prompt; the rest of the line is dropped
pub const INPUT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// This many packages were handed to the acquire callback
    Processed(usize),
    /// No usable selection was made
    NothingToDo,
}

/// Read one answer line, capped at `INPUT_CAPACITY` bytes
pub fn read_selection<R: BufRead>(reader: R) -> io::Result<Vec<u8>> {
    let mut line = Vec::with_capacity(INPUT_CAPACITY);
    reader
        .take(INPUT_CAPACITY as u64)
        .read_until(b'\n', &mut line)?;
    Ok(line)
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    End,
    Tab,
    Number(usize),
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn next_token(&mut self) -> Token {
        while self.input.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
        match self.input.get(self.pos) {
            None => Token::End,
            Some(b'\t') => Token::Tab,
            Some(_) => Token::Number(self.digits_at_pos()),
        }
    }

    /// Value of the digit run at the cursor; 0 when there is none,
    /// saturating on overflow
    fn digits_at_pos(&self) -> usize {
        self.input[self.pos..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .fold(0usize, |acc, b| {
                acc.saturating_mul(10).saturating_add((b - b'0') as usize)
            })
    }

    fn step(&mut self) {
        self.pos += 1;
    }

    /// Move past the current token up to the next space
    fn skip_token(&mut self) {
        while let Some(&b) = self.input.get(self.pos) {
            if b == b' ' {
                break;
            }
            self.pos += 1;
        }
    }
}

fn resolve(number: usize, records: &[PackageSummary]) -> Option<&PackageSummary> {
    if number == 0 || number > records.len() {
        return None;
    }
    let pkg = &records[number - 1];
    pkg.url_path.as_ref().map(|_| pkg)
}

/// Walk the answer line and call `acquire` with each confirmed 1-based
/// number and its record, in input order.
///
/// Errors from `acquire` stop the walk and are returned unchanged.
pub fn drive<F>(input: &[u8], records: &[PackageSummary], mut acquire: F) -> AurResult<SelectionOutcome>
where
    F: FnMut(usize, &PackageSummary) -> AurResult<()>,
{
    let mut scanner = Scanner::new(input);
    let mut confirmed = 0usize;

    loop {
        let number = match scanner.next_token() {
            Token::End => break,
            Token::Tab => {
                debug!("tab in selection, ignoring the rest of the line");
                break;
            }
            Token::Number(n) => n,
        };

        // With several results a zero (or a non-digit) is just noise
        if records.len() > 1 && number == 0 {
            scanner.step();
            continue;
        }

        match resolve(number, records) {
            Some(pkg) => {
                acquire(number, pkg)?;
                confirmed += 1;
            }
            None if confirmed == 0 => return Ok(SelectionOutcome::NothingToDo),
            None => debug!("ignoring selection {}", number),
        }

        scanner.skip_token();
    }

    if confirmed == 0 {
        Ok(SelectionOutcome::NothingToDo)
    } else {
        Ok(SelectionOutcome::Processed(confirmed))
    }
}
