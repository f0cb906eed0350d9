//! Hand-written entity fixtures shared by unit tests.

use chrono::NaiveDate;

use crate::error::{Result, SpecError};
use crate::schema::{Entity, EntitySchema, FieldDescriptor, FieldType, FieldValue, Record, Related, Slot};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub nickname: Option<String>,
    pub initial: char,
    pub active: bool,
    pub score: f64,
    pub born: Option<NaiveDate>,
    pub country: Option<Box<Country>>,
}

impl Person {
    pub fn new(name: &str, age: i32) -> Self {
        Person {
            id: 0,
            name: name.to_string(),
            age,
            nickname: None,
            initial: name.chars().next().unwrap_or('?'),
            active: true,
            score: 0.0,
            born: None,
            country: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_country(mut self, country: Country) -> Self {
        self.country = Some(Box::new(country));
        self
    }

    pub fn with_born(mut self, born: NaiveDate) -> Self {
        self.born = Some(born);
        self
    }
}

fn unknown(entity: &'static str, field: &str) -> SpecError {
    SpecError::PathResolution {
        entity,
        path: field.to_string(),
        segment: field.to_string(),
    }
}

impl Entity for Person {
    fn entity_schema() -> &'static EntitySchema {
        static SCHEMA: EntitySchema = EntitySchema {
            name: "Person",
            fields: &[
                FieldDescriptor::new("Id", FieldType::Int, false),
                FieldDescriptor::new("Name", FieldType::String, false),
                FieldDescriptor::new("Age", FieldType::Int, false),
                FieldDescriptor::new("Nickname", FieldType::String, true),
                FieldDescriptor::new("Initial", FieldType::Char, false),
                FieldDescriptor::new("Active", FieldType::Bool, false),
                FieldDescriptor::new("Score", FieldType::Float, false),
                FieldDescriptor::new("Born", FieldType::Date, true),
                FieldDescriptor::new("Country", FieldType::One(Country::entity_schema), true),
            ],
            key: Some("Id"),
        };
        &SCHEMA
    }
}

impl Record for Person {
    fn schema(&self) -> &'static EntitySchema {
        Self::entity_schema()
    }

    fn get(&self, field: &str) -> Slot<'_> {
        match field {
            "Id" => Slot::Value(self.id.to_value()),
            "Name" => Slot::Value(self.name.to_value()),
            "Age" => Slot::Value(self.age.to_value()),
            "Nickname" => Slot::Value(self.nickname.to_value()),
            "Initial" => Slot::Value(self.initial.to_value()),
            "Active" => Slot::Value(self.active.to_value()),
            "Score" => Slot::Value(self.score.to_value()),
            "Born" => Slot::Value(self.born.to_value()),
            "Country" => Slot::One(self.country.records().into_iter().next()),
            _ => Slot::Missing,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "Id" => self.id = FieldValue::from_value(value)?,
            "Name" => self.name = FieldValue::from_value(value)?,
            "Age" => self.age = FieldValue::from_value(value)?,
            "Nickname" => self.nickname = FieldValue::from_value(value)?,
            "Initial" => self.initial = FieldValue::from_value(value)?,
            "Active" => self.active = FieldValue::from_value(value)?,
            "Score" => self.score = FieldValue::from_value(value)?,
            "Born" => self.born = FieldValue::from_value(value)?,
            other => return Err(unknown("Person", other)),
        }
        Ok(())
    }

    fn related_mut(&mut self, field: &str) -> Vec<&mut dyn Record> {
        match field {
            "Country" => self.country.records_mut(),
            _ => Vec::new(),
        }
    }

    fn retain_related(&mut self, field: &str, keep: &dyn Fn(&dyn Record) -> bool) {
        if field == "Country" {
            self.country.retain(keep);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub population: u64,
    pub people: Vec<Person>,
}

impl Country {
    pub fn new(name: &str) -> Self {
        Country {
            id: 0,
            name: name.to_string(),
            population: 0,
            people: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_people(mut self, people: Vec<Person>) -> Self {
        self.people = people;
        self
    }
}

impl Entity for Country {
    fn entity_schema() -> &'static EntitySchema {
        static SCHEMA: EntitySchema = EntitySchema {
            name: "Country",
            fields: &[
                FieldDescriptor::new("Id", FieldType::Int, false),
                FieldDescriptor::new("Name", FieldType::String, false),
                FieldDescriptor::new("Population", FieldType::UInt, false),
                FieldDescriptor::new("People", FieldType::Many(Person::entity_schema), false),
            ],
            key: Some("Id"),
        };
        &SCHEMA
    }
}

impl Record for Country {
    fn schema(&self) -> &'static EntitySchema {
        Self::entity_schema()
    }

    fn get(&self, field: &str) -> Slot<'_> {
        match field {
            "Id" => Slot::Value(self.id.to_value()),
            "Name" => Slot::Value(self.name.to_value()),
            "Population" => Slot::Value(self.population.to_value()),
            "People" => Slot::Many(self.people.records()),
            _ => Slot::Missing,
        }
    }

    fn set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "Id" => self.id = FieldValue::from_value(value)?,
            "Name" => self.name = FieldValue::from_value(value)?,
            "Population" => self.population = FieldValue::from_value(value)?,
            other => return Err(unknown("Country", other)),
        }
        Ok(())
    }

    fn related_mut(&mut self, field: &str) -> Vec<&mut dyn Record> {
        match field {
            "People" => self.people.records_mut(),
            _ => Vec::new(),
        }
    }

    fn retain_related(&mut self, field: &str, keep: &dyn Fn(&dyn Record) -> bool) {
        if field == "People" {
            Related::retain(&mut self.people, keep);
        }
    }
}
