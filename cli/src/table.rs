// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{borrow::Cow, fmt};

use colored::{Color, Colorize};
use unicode_width::UnicodeWidthStr;

pub struct Table<'a, T, C: TableColumn<T>> {
    columns: &'a [C],
    data: &'a [T],
    separator: &'static str,
    header: bool,
}

impl<'a, T, C: TableColumn<T>> Table<'a, T, C> {
    pub fn new(columns: &'a [C], data: &'a [T]) -> Self {
        Self {
            columns,
            data,
            separator: "  ",
            header: true,
        }
    }

    #[allow(dead_code)]
    pub fn without_header(mut self) -> Self {
        self.header = false;
        self
    }

    fn widths(&self, rows: &[Vec<Cow<'_, str>>]) -> Vec<usize> {
        let mut widths: Vec<usize> = match self.header {
            true => self.columns.iter().map(|c| c.name().width()).collect(),
            false => vec![0; self.columns.len()],
        };
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.width());
            }
        }
        widths
    }
}

impl<T, C: TableColumn<T>> fmt::Display for Table<'_, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<Vec<Cow<'_, str>>> = self
            .data
            .iter()
            .map(|item| self.columns.iter().map(|col| col.format(item)).collect())
            .collect();

        let widths = self.widths(&rows);
        let last = self.columns.len().saturating_sub(1);

        if self.header {
            for (i, col) in self.columns.iter().enumerate() {
                let cell = pad(&col.name(), widths[i], col.padding_direction(), i == last);
                write!(f, "{}", cell.bold())?;
                f.write_str(if i == last { "\n" } else { self.separator })?;
            }
        }

        for (cells, item) in rows.iter().zip(self.data) {
            for (i, (col, cell)) in self.columns.iter().zip(cells).enumerate() {
                let cell = pad(cell, widths[i], col.padding_direction(), i == last);
                match col.get_color(item) {
                    Some(color) => write!(f, "{}", cell.color(color))?,
                    None => f.write_str(&cell)?,
                }
                f.write_str(if i == last { "\n" } else { self.separator })?;
            }
        }
        Ok(())
    }
}

pub trait TableColumn<T> {
    fn name(&self) -> Cow<'_, str>;

    fn format<'a>(&self, data: &'a T) -> Cow<'a, str>;

    fn padding_direction(&self) -> PaddingDirection {
        PaddingDirection::Left
    }

    fn get_color(&self, _data: &T) -> Option<Color> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingDirection {
    Left,
    Right,
}

fn pad(cell: &str, width: usize, direction: PaddingDirection, last: bool) -> String {
    // width() counts display columns, format! counts chars
    let fill = " ".repeat(width.saturating_sub(cell.width()));
    match direction {
        PaddingDirection::Left if last => cell.to_string(), // no trailing spaces
        PaddingDirection::Left => format!("{cell}{fill}"),
        PaddingDirection::Right => format!("{fill}{cell}"),
    }
}
