//! Named map viewports.
//!
//! Views live in their own workbook with one row per view. `Deutschland`
//! and the sixteen state views are defaults and cannot be removed.

use log::info;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::place::{Place, is_state};
use crate::store::write_atomic;
use crate::workbook::{SheetTable, cell_number, cell_text, read_first_sheet, write_headers};

pub const COUNTRY_VIEW: &str = "Deutschland";

pub const VIEW_HEADERS: [&str; 7] = [
    "View",
    "lat_0",
    "lon_0",
    "llcrnrlon",
    "llcrnrlat",
    "urcrnrlon",
    "urcrnrlat",
];

/// A map viewport: center plus lower-left and upper-right corners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub lat_0: f64,
    pub lon_0: f64,
    pub llcrnrlat: f64,
    pub llcrnrlon: f64,
    pub urcrnrlat: f64,
    pub urcrnrlon: f64,
}

impl View {
    /// Whole-country view used when no views file exists.
    pub fn country() -> Self {
        View {
            name: COUNTRY_VIEW.to_string(),
            lat_0: 51.1657,
            lon_0: 10.4515,
            llcrnrlat: 47.2,
            llcrnrlon: 5.8,
            urcrnrlat: 55.1,
            urcrnrlon: 15.1,
        }
    }

    /// Build a view from a place search hit, framing its bounding box.
    pub fn from_place(place: &Place) -> Result<Self> {
        let bbox = place
            .bounding_box
            .ok_or_else(|| Error::View(format!("{} has no bounding box", place.display_name)))?;
        let name = if place.name.is_empty() {
            place.display_name.clone()
        } else {
            place.name.clone()
        };
        Ok(View {
            name,
            lat_0: place.latitude,
            lon_0: place.longitude,
            llcrnrlat: bbox.south,
            llcrnrlon: bbox.west,
            urcrnrlat: bbox.north,
            urcrnrlon: bbox.east,
        })
    }

    /// Views that cover the country or a whole state rather than one city.
    pub fn is_regional(&self) -> bool {
        is_default_view(&self.name)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::View("View name cannot be empty.".to_string()));
        }
        let values = [
            self.lat_0,
            self.lon_0,
            self.llcrnrlat,
            self.llcrnrlon,
            self.urcrnrlat,
            self.urcrnrlon,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::View(format!("View {} has non-numeric coordinates", self.name)));
        }
        Ok(())
    }
}

pub fn is_default_view(name: &str) -> bool {
    name == COUNTRY_VIEW || is_state(name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
}

#[derive(Clone, Debug)]
pub struct ViewCatalog {
    path: PathBuf,
    views: Vec<View>,
}

impl ViewCatalog {
    /// Read the views workbook. A missing file yields just the country view.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            log::warn!("{} not found, using default view", path.display());
            return Ok(ViewCatalog {
                path,
                views: vec![View::country()],
            });
        }
        let sheet = read_first_sheet(&path)?;
        let views = parse_views(&sheet)?;
        Ok(ViewCatalog { path, views })
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.views.iter().map(|v| v.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }

    /// Replace the view with the same name, or append a new one.
    pub fn upsert(&mut self, view: View) -> Result<Upsert> {
        view.validate()?;
        match self.views.iter_mut().find(|v| v.name == view.name) {
            Some(existing) => {
                *existing = view;
                Ok(Upsert::Updated)
            }
            None => {
                self.views.push(view);
                Ok(Upsert::Added)
            }
        }
    }

    /// Remove a view by name. Default views are refused.
    pub fn remove(&mut self, name: &str) -> Result<View> {
        if is_default_view(name) {
            return Err(Error::View("Cannot remove default views".to_string()));
        }
        let index = self
            .views
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| Error::View(format!("No view named {}", name)))?;
        Ok(self.views.remove(index))
    }

    pub fn save(&self) -> Result<()> {
        let mut workbook = Workbook::new();
        let mut sheet = Worksheet::new();
        write_headers(&mut sheet, &VIEW_HEADERS)?;
        for (i, view) in self.views.iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, &view.name)?;
            sheet.write_number(row, 1, view.lat_0)?;
            sheet.write_number(row, 2, view.lon_0)?;
            sheet.write_number(row, 3, view.llcrnrlon)?;
            sheet.write_number(row, 4, view.llcrnrlat)?;
            sheet.write_number(row, 5, view.urcrnrlon)?;
            sheet.write_number(row, 6, view.urcrnrlat)?;
        }
        workbook.push_worksheet(sheet);
        write_atomic(&self.path, &workbook.save_to_buffer()?)?;
        info!("saved {} views", self.views.len());
        Ok(())
    }
}

fn parse_views(sheet: &SheetTable) -> Result<Vec<View>> {
    let cols: Vec<usize> = VIEW_HEADERS
        .iter()
        .map(|h| sheet.column(h))
        .collect::<Result<_>>()?;

    let mut views = Vec::new();
    for (index, row) in sheet.data_rows() {
        let number = |i: usize| -> Result<f64> {
            cell_number(sheet.cell(row, cols[i]))
                .ok_or_else(|| sheet.invalid(index, format!("{} is not a number", VIEW_HEADERS[i])))
        };
        views.push(View {
            name: cell_text(sheet.cell(row, cols[0])),
            lat_0: number(1)?,
            lon_0: number(2)?,
            llcrnrlon: number(3)?,
            llcrnrlat: number(4)?,
            urcrnrlon: number(5)?,
            urcrnrlat: number(6)?,
        });
    }
    Ok(views)
}
