use crate::store::Record;
use serde::{Deserialize, Serialize};

/// Table holding employee records.
pub const EMPLOYEES_TABLE: &str = "employees";

const DEPARTMENTS: [&str; 5] = [
    "Sales Floor",
    "Customer Service",
    "Electronics",
    "Clothing",
    "Grocery",
];

/// Weekly availability flags, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Monday.
    pub monday: bool,
    /// Tuesday.
    pub tuesday: bool,
    /// Wednesday.
    pub wednesday: bool,
    /// Thursday.
    pub thursday: bool,
    /// Friday.
    pub friday: bool,
    /// Saturday.
    pub saturday: bool,
    /// Sunday.
    pub sunday: bool,
}

impl Availability {
    /// Available every day.
    pub fn always() -> Self {
        Self {
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: true,
            sunday: true,
        }
    }

    /// Whether the employee works on `day` (0 = Monday).
    pub fn on(&self, day: usize) -> bool {
        match day {
            0 => self.monday,
            1 => self.tuesday,
            2 => self.wednesday,
            3 => self.thursday,
            4 => self.friday,
            5 => self.saturday,
            6 => self.sunday,
            _ => false,
        }
    }
}

/// An employee record as stored in the `employees` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Stable identifier, e.g. `emp_007`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Home department.
    pub department: String,
    /// Departments the employee can cover.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Hourly wage in dollars.
    pub hourly_wage: f64,
    /// Contracted maximum hours per week.
    pub max_hours_per_week: u32,
    /// Days the employee can work.
    pub availability: Availability,
}

impl Employee {
    /// Whether the employee belongs to or is skilled for `department`.
    pub fn can_cover(&self, department: &str) -> bool {
        self.department == department || self.skills.iter().any(|s| s == department)
    }

    /// Convert to a store record.
    pub fn to_record(&self) -> Record {
        serde_json::to_value(self).unwrap_or(Record::Null)
    }

    /// Parse a store record, ignoring records of a different shape.
    pub fn from_record(record: &Record) -> Option<Self> {
        serde_json::from_value(record.clone()).ok()
    }
}

/// A deterministic roster of `count` employees spread across the store's
/// departments. The same `count` always yields the same roster.
pub fn demo_roster(count: usize) -> Vec<Employee> {
    (0..count)
        .map(|i| {
            let department = DEPARTMENTS[i % DEPARTMENTS.len()];
            let second = DEPARTMENTS[(i + 2) % DEPARTMENTS.len()];
            let mut availability = Availability::always();
            // Every third employee is off on weekends.
            if i % 3 == 2 {
                availability.saturday = false;
                availability.sunday = false;
            }
            Employee {
                id: format!("emp_{i:03}"),
                name: format!("Employee {}", i + 1),
                department: department.to_string(),
                skills: vec![department.to_string(), second.to_string()],
                hourly_wage: 15.5 + ((i * 37) % 125) as f64 / 10.0,
                max_hours_per_week: [20, 30, 40][i % 3],
                availability,
            }
        })
        .collect()
}
