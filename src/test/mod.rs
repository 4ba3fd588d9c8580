mod controller;
mod packet;
