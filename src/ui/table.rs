use eframe::egui::Ui;
use egui_extras::{Column, TableBuilder};

use crate::state::TABLE_FIELDS;

const ROW_HEIGHT: f32 = 18.0;

/// List pre-formatted rows under a [`TABLE_FIELDS`] header.
pub fn rows_table(ui: &mut Ui, rows: &[Vec<String>]) {
    if rows.is_empty() {
        ui.label("No rows for this selection.");
        return;
    }

    TableBuilder::new(ui)
        .id_salt("bar_rows_table")
        .striped(true)
        .max_scroll_height(260.0)
        .column(Column::auto().at_least(140.0))
        .columns(Column::auto().at_least(80.0), TABLE_FIELDS.len() - 1)
        .header(ROW_HEIGHT + 2.0, |mut header| {
            for field in TABLE_FIELDS {
                header.col(|ui| {
                    ui.strong(field.header());
                });
            }
        })
        .body(|body| {
            body.rows(ROW_HEIGHT, rows.len(), |mut row| {
                let cells = &rows[row.index()];
                for cell in cells {
                    row.col(|ui| {
                        ui.label(cell.as_str());
                    });
                }
            });
        });
}
